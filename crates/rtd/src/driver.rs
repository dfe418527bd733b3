use crate::convert;
use crate::fault::possible_causes;
use crate::register::{
    RtdConfigRegister, RtdRegisterFrame, FRAME_LEN, REG_CONFIG, REG_FAULT_STATUS,
    REG_HIGH_FAULT_MSB, WRITE,
};
use crate::transport::{InterruptSource, SpiTransport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thermo_core::{lock, PollMode, Reading, Result, ThermoError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Readings retained for [`RtdDriver::get_readings`].
pub const READINGS_CAP: usize = 100;

const READING_BUFFER: usize = 16;
/// Pending conversion-ready triggers before the interrupt path reports overflow.
const TRIGGER_QUEUE: usize = 4;
/// Config-register polls while waiting for the fault-detect cycle.
const FAULT_DETECT_ATTEMPTS: usize = 50;
const FAULT_DETECT_WAIT: Duration = Duration::from_millis(1);

type SharedInterrupt = Arc<Mutex<Box<dyn InterruptSource>>>;

struct ChipState {
    spi:      Box<dyn SpiTransport>,
    register: RtdConfigRegister,
    offset:   f64,
}

impl ChipState {
    fn read_frame(&mut self) -> Result<RtdRegisterFrame> {
        let mut request = [0u8; FRAME_LEN + 1];
        request[0] = REG_CONFIG;
        let response = self.spi.transfer(&request)?;
        if response.len() != request.len() {
            return Err(ThermoError::Parse(format!(
                "short transfer: {} of {} bytes",
                response.len(),
                request.len()
            )));
        }

        let mut frame = [0u8; FRAME_LEN];
        frame.copy_from_slice(&response[1..]);
        Ok(RtdRegisterFrame(frame))
    }

    fn read_register(&mut self, address: u8) -> Result<u8> {
        let response = self.spi.transfer(&[address, 0])?;
        response
            .get(1)
            .copied()
            .ok_or_else(|| ThermoError::Parse(format!("no data for register {address:#04x}")))
    }

    fn write_registers(&mut self, address: u8, values: &[u8]) -> Result<()> {
        let mut request = Vec::with_capacity(values.len() + 1);
        request.push(address | WRITE);
        request.extend_from_slice(values);
        self.spi.transfer(&request)?;
        Ok(())
    }

    fn verify(&mut self) -> Result<RtdRegisterFrame> {
        let frame = self.read_frame().map_err(|e| match e {
            ThermoError::Io { source } => ThermoError::NoInterface(source.to_string()),
            other => other,
        })?;
        if frame.is_all(0x00) {
            return Err(ThermoError::AllZeroes);
        }
        if frame.is_all(0xFF) {
            return Err(ThermoError::AllOnes);
        }
        Ok(frame)
    }

    /// Uncorrected temperature and the code it came from.
    fn read_temperature(&mut self) -> Result<(u16, f64)> {
        let frame = self.read_frame()?;
        if frame.fault_flagged() {
            let status = frame.fault_status();
            self.write_registers(REG_CONFIG, &[self.register.clear_faults_register()])?;
            return Err(ThermoError::Fault {
                status,
                causes: possible_causes(status, self.register.wiring),
            });
        }

        let code = frame.rtd();
        let celsius = convert::temperature(
            code,
            self.register.reference_resistance,
            self.register.nominal_resistance,
        );
        Ok((code, celsius))
    }

    fn detect_faults(&mut self) -> Result<u8> {
        self.write_registers(REG_CONFIG, &[self.register.fault_detect_register()])?;

        let mut finished = false;
        for _ in 0..FAULT_DETECT_ATTEMPTS {
            if RtdConfigRegister::fault_detect_finished(self.read_register(REG_CONFIG)?) {
                finished = true;
                break;
            }
            std::thread::sleep(FAULT_DETECT_WAIT);
        }

        let status = self.read_register(REG_FAULT_STATUS)?;
        self.write_registers(REG_CONFIG, &[self.register.clear_faults_register()])?;
        if !finished {
            return Err(ThermoError::Timeout("fault-detect cycle".into()));
        }
        Ok(status)
    }
}

/// Register access shared between the driver and its poll loop.
#[derive(Clone)]
struct Chip {
    id:    String,
    state: Arc<Mutex<ChipState>>,
}

impl Chip {
    /// One corrected sample. Holding the lock keeps the frame read whole.
    fn sample(&self) -> Reading {
        let mut state = lock(&self.state);
        match state.read_temperature() {
            Ok((code, celsius)) => Reading::ok(&self.id, celsius + state.offset, format!("{code:#06x}")),
            Err(e) => Reading::failed(&self.id, e),
        }
    }
}

/// FIFO of the most recent readings, read from outside the poll loop.
#[derive(Clone, Default)]
struct ReadingsBuffer(Arc<Mutex<VecDeque<Reading>>>);

impl ReadingsBuffer {
    fn push(&self, reading: Reading) {
        let mut readings = lock(&self.0);
        if readings.len() == READINGS_CAP {
            readings.pop_front();
        }
        readings.push_back(reading);
    }

    fn take(&self) -> Vec<Reading> {
        std::mem::take(&mut *lock(&self.0)).into()
    }
}

struct PollHandle {
    stop: oneshot::Sender<()>,
    done: oneshot::Receiver<Result<()>>,
}

/// Driver for an SPI-attached RTD-to-digital converter.
pub struct RtdDriver {
    chip:      Chip,
    interrupt: Option<SharedInterrupt>,
    readings:  ReadingsBuffer,
    polling:   Option<PollHandle>,
}

impl RtdDriver {
    /// Verify the device answers sensibly, then write the base configuration.
    pub fn new(
        id: impl Into<String>,
        spi: impl SpiTransport,
        register: RtdConfigRegister,
    ) -> Result<Self> {
        let mut state = ChipState {
            spi: Box::new(spi),
            register,
            offset: 0.0,
        };
        state.verify()?;
        state.write_registers(REG_CONFIG, &[register.base_register()])?;

        let id = id.into();
        debug!(sensor = %id, config = register.base_register(), "RTD converter ready");
        Ok(Self {
            chip: Chip {
                id,
                state: Arc::new(Mutex::new(state)),
            },
            interrupt: None,
            readings: ReadingsBuffer::default(),
            polling: None,
        })
    }

    /// Attach a conversion-ready line for [`PollMode::Interrupt`].
    pub fn with_interrupt(mut self, source: impl InterruptSource) -> Self {
        self.interrupt = Some(Arc::new(Mutex::new(Box::new(source))));
        self
    }

    pub fn id(&self) -> &str {
        &self.chip.id
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_some()
    }

    pub fn register(&self) -> RtdConfigRegister {
        lock(&self.chip.state).register
    }

    /// Re-read the register frame and check it is not all zeroes or ones.
    pub fn verify(&self) -> Result<RtdRegisterFrame> {
        lock(&self.chip.state).verify()
    }

    pub fn read_frame(&self) -> Result<RtdRegisterFrame> {
        lock(&self.chip.state).read_frame()
    }

    /// Uncorrected temperature in °C.
    ///
    /// A flagged conversion clears the device's fault latch and returns
    /// [`ThermoError::Fault`].
    pub fn read_temperature(&self) -> Result<f64> {
        lock(&self.chip.state).read_temperature().map(|(_, celsius)| celsius)
    }

    /// Write a new wiring/filter configuration and keep its calibration.
    pub fn configure(&self, register: RtdConfigRegister) -> Result<()> {
        let mut state = lock(&self.chip.state);
        state.write_registers(REG_CONFIG, &[register.base_register()])?;
        state.register = register;
        Ok(())
    }

    /// Run the automatic fault-detection cycle and return the fault status.
    pub fn detect_faults(&self) -> Result<u8> {
        lock(&self.chip.state).detect_faults()
    }

    /// Program the low/high fault thresholds as 15-bit RTD codes.
    pub fn set_fault_thresholds(&self, low: u16, high: u16) -> Result<()> {
        let [high_msb, high_lsb] = (high << 1).to_be_bytes();
        let [low_msb, low_lsb] = (low << 1).to_be_bytes();
        lock(&self.chip.state)
            .write_registers(REG_HIGH_FAULT_MSB, &[high_msb, high_lsb, low_msb, low_lsb])
    }

    /// Correction added to every polled sample.
    pub fn set_offset(&self, offset: f64) {
        lock(&self.chip.state).offset = offset;
    }

    pub fn offset(&self) -> f64 {
        lock(&self.chip.state).offset
    }

    /// [`configure`](Self::configure) on the blocking pool.
    pub async fn apply(&self, register: RtdConfigRegister) -> Result<()> {
        let state = Arc::clone(&self.chip.state);
        tokio::task::spawn_blocking(move || {
            let mut state = lock(&state);
            state.write_registers(REG_CONFIG, &[register.base_register()])?;
            state.register = register;
            Ok(())
        })
        .await?
    }

    /// One corrected sample on the blocking pool.
    pub async fn sample(&self) -> Result<Reading> {
        let chip = self.chip.clone();
        Ok(tokio::task::spawn_blocking(move || chip.sample()).await?)
    }

    /// Readings taken since the previous call, oldest first.
    pub fn get_readings(&self) -> Vec<Reading> {
        self.readings.take()
    }

    /// Start the poll loop, triggered by a timer or the interrupt line.
    pub fn poll(&mut self, mode: PollMode) -> Result<mpsc::Receiver<Reading>> {
        if self.polling.is_some() {
            return Err(ThermoError::AlreadyPolling);
        }
        if mode == PollMode::Interval(Duration::ZERO) {
            return Err(ThermoError::Config("poll interval must be non-zero".into()));
        }

        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE);
        let interrupt = match mode {
            PollMode::Interval(interval) => {
                tokio::spawn(tick(interval, trigger_tx));
                None
            }
            PollMode::Interrupt => {
                let source = self.interrupt.clone().ok_or_else(|| {
                    ThermoError::Unsupported("no interrupt source attached".into())
                })?;
                lock(&source).open(Box::new(move || match trigger_tx.try_send(()) {
                    Ok(()) | Err(TrySendError::Closed(())) => Ok(()),
                    Err(TrySendError::Full(())) => Err(ThermoError::TooManyTriggers),
                }))?;
                Some(source)
            }
        };

        let (tx, rx) = mpsc::channel(READING_BUFFER);
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(poll_loop(PollLoop {
            chip: self.chip.clone(),
            readings: self.readings.clone(),
            interrupt,
            triggers: trigger_rx,
            publish: Some(tx),
            stop: stop_rx,
            done: done_tx,
        }));
        self.polling = Some(PollHandle {
            stop: stop_tx,
            done: done_rx,
        });

        info!(sensor = %self.chip.id, ?mode, "RTD polling started");
        Ok(rx)
    }

    /// Stop polling and wait for the loop to finish.
    ///
    /// A no-op when not polling; only fails if releasing the interrupt
    /// line fails.
    pub async fn close(&mut self) -> Result<()> {
        let Some(handle) = self.polling.take() else {
            return Ok(());
        };

        let _ = handle.stop.send(());
        let result = handle.done.await.unwrap_or(Ok(()));

        info!(sensor = %self.chip.id, "RTD polling stopped");
        result
    }
}

/// Fire a trigger every `interval` until the poll loop goes away.
async fn tick(interval: Duration, triggers: mpsc::Sender<()>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            _ = triggers.closed() => break,
            _ = ticker.tick() => {}
        }
        if triggers.send(()).await.is_err() {
            break; // poll loop gone
        }
    }
}

struct PollLoop {
    chip:      Chip,
    readings:  ReadingsBuffer,
    interrupt: Option<SharedInterrupt>,
    triggers:  mpsc::Receiver<()>,
    /// `None` once the caller dropped its stream; sampling continues.
    publish:   Option<mpsc::Sender<Reading>>,
    stop:      oneshot::Receiver<()>,
    done:      oneshot::Sender<Result<()>>,
}

async fn poll_loop(mut state: PollLoop) {
    loop {
        tokio::select! {
            _ = &mut state.stop => break,
            trigger = state.triggers.recv() => {
                if trigger.is_none() {
                    break;
                }
            }
        }

        // The sample always completes before a stop is honoured.
        let chip = state.chip.clone();
        let reading = match tokio::task::spawn_blocking(move || chip.sample()).await {
            Ok(reading) => reading,
            Err(e) => Reading::failed(&state.chip.id, e),
        };
        match &reading.error {
            Some(err) => warn!(sensor = %state.chip.id, "RTD sample failed: {err}"),
            None => debug!(sensor = %state.chip.id, value = ?reading.value, "sampled"),
        }
        state.readings.push(reading.clone());

        let reader_gone = match &state.publish {
            Some(publish) => tokio::select! {
                _ = &mut state.stop => break,
                sent = publish.send(reading) => sent.is_err(),
            },
            None => false,
        };
        if reader_gone {
            state.publish = None;
        }
    }

    drop(state.publish);
    drop(state.triggers);

    let mut result = Ok(());
    if let Some(source) = state.interrupt {
        if let Err(e) = lock(&source).close() {
            warn!(sensor = %state.chip.id, "failed to release interrupt line: {e}");
            result = Err(e);
        }
    }
    let _ = state.done.send(result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{Wiring, CLEAR_FAULT};
    use crate::transport::fake::{FakeChip, ManualInterrupt};

    /// Code for 100 Ω with a 430 Ω reference: 0 °C.
    const ZERO_C: u16 = 7620;
    /// Code for 80.31 Ω: about -50 °C.
    const MINUS_50_C: u16 = 6120;

    fn driver(chip: &FakeChip) -> RtdDriver {
        RtdDriver::new("rtd0", chip.clone(), RtdConfigRegister::default()).unwrap()
    }

    fn reading(value: f64) -> Reading {
        Reading::ok("rtd0", value, value.to_string())
    }

    #[test]
    fn construction_writes_base_register() {
        let chip = FakeChip::with_code(ZERO_C);
        let three_wire = RtdConfigRegister {
            wiring: Wiring::ThreeWire,
            ..RtdConfigRegister::default()
        };
        RtdDriver::new("rtd0", chip.clone(), three_wire).unwrap();
        assert_eq!(chip.state().writes, vec![(REG_CONFIG, vec![three_wire.base_register()])]);
        assert_eq!(chip.state().regs[0], 0b1101_0001);
    }

    #[test]
    fn verify_rejects_dead_bus() {
        let zeroes = RtdDriver::new("rtd0", FakeChip::with_frame([0x00; 8]), Default::default());
        assert!(matches!(zeroes, Err(ThermoError::AllZeroes)));

        let ones = RtdDriver::new("rtd0", FakeChip::with_frame([0xFF; 8]), Default::default());
        assert!(matches!(ones, Err(ThermoError::AllOnes)));

        let unplugged = FakeChip::with_code(ZERO_C);
        unplugged.state().fail = true;
        let err = RtdDriver::new("rtd0", unplugged, Default::default());
        assert!(matches!(err, Err(ThermoError::NoInterface(_))));
    }

    #[test]
    fn converts_both_branches() {
        let chip = FakeChip::with_code(ZERO_C);
        let driver = driver(&chip);
        assert!(driver.read_temperature().unwrap().abs() < 0.05);

        chip.set_code(MINUS_50_C);
        let t = driver.read_temperature().unwrap();
        assert!(t < 0.0);
        assert!((t + 50.0).abs() < 0.2, "{t}");
    }

    #[test]
    fn fault_bit_clears_and_reports_causes() {
        let chip = FakeChip::with_code(ZERO_C);
        let driver = driver(&chip);
        chip.set_fault(0x80);

        match driver.read_temperature() {
            Err(ThermoError::Fault { status, causes }) => {
                assert_eq!(status, 0x80);
                assert!(causes.contains(&"RTD element open"));
            }
            other => panic!("expected fault, got {other:?}"),
        }

        let last_write = chip.state().writes.last().cloned().unwrap();
        assert_eq!(last_write.0, REG_CONFIG);
        assert_ne!(last_write.1[0] & CLEAR_FAULT, 0);

        assert!(driver.read_temperature().is_ok());
    }

    #[test]
    fn fault_detection_cycle() {
        let chip = FakeChip::with_code(ZERO_C);
        let driver = driver(&chip);
        chip.state().regs[7] = 0x10;

        assert_eq!(driver.detect_faults().unwrap(), 0x10);
        let writes = chip.state().writes.clone();
        assert_eq!(writes[1], (REG_CONFIG, vec![0b1000_0101]));
        assert_eq!(
            writes.last().unwrap(),
            &(REG_CONFIG, vec![RtdConfigRegister::default().clear_faults_register()])
        );
    }

    #[test]
    fn fault_thresholds_are_shifted_codes() {
        let chip = FakeChip::with_code(ZERO_C);
        let driver = driver(&chip);
        driver.set_fault_thresholds(0x0100, 0x7FFF).unwrap();

        let frame = driver.read_frame().unwrap();
        assert_eq!(frame.high_threshold(), 0x7FFF);
        assert_eq!(frame.low_threshold(), 0x0100);
    }

    #[test]
    fn configure_updates_wiring() {
        let chip = FakeChip::with_code(ZERO_C);
        let driver = driver(&chip);
        let four_wire = RtdConfigRegister {
            wiring: Wiring::FourWire,
            ..RtdConfigRegister::default()
        };
        driver.configure(four_wire).unwrap();
        assert_eq!(driver.register(), four_wire);
    }

    #[test]
    fn readings_buffer_keeps_latest_hundred() {
        let buffer = ReadingsBuffer::default();
        for i in 0..150 {
            buffer.push(reading(f64::from(i)));
        }
        let kept = buffer.take();
        assert_eq!(kept.len(), READINGS_CAP);
        assert_eq!(kept.first().unwrap().value, Some(50.0));
        assert_eq!(kept.last().unwrap().value, Some(149.0));
        assert!(buffer.take().is_empty());
    }

    #[tokio::test]
    async fn timer_poll_publishes_and_buffers() {
        let chip = FakeChip::with_code(ZERO_C);
        let mut driver = driver(&chip);
        driver.set_offset(10.0);

        let mut rx = driver.poll(PollMode::Interval(Duration::from_millis(5))).unwrap();
        for _ in 0..3 {
            let r = rx.recv().await.unwrap();
            assert!((r.value.unwrap() - 10.0).abs() < 0.05);
            assert_eq!(r.raw.as_deref(), Some("0x1dc4"));
        }
        driver.close().await.unwrap();
        while rx.recv().await.is_some() {}

        let buffered = driver.get_readings();
        assert!(buffered.len() >= 3);
        assert!(driver.get_readings().is_empty());
    }

    #[tokio::test]
    async fn faulty_samples_do_not_stop_polling() {
        let chip = FakeChip::with_code(ZERO_C);
        let mut driver = driver(&chip);
        chip.set_fault(0x04);

        let mut rx = driver.poll(PollMode::Interval(Duration::from_millis(5))).unwrap();
        let first = rx.recv().await.unwrap();
        assert!(first.error.unwrap().contains("fault"));

        let second = rx.recv().await.unwrap();
        assert!(second.is_ok());
        driver.close().await.unwrap();
    }

    #[tokio::test]
    async fn poll_twice_and_close_twice() {
        let chip = FakeChip::with_code(ZERO_C);
        let mut driver = driver(&chip);
        driver.close().await.unwrap();

        let _rx = driver.poll(PollMode::Interval(Duration::from_millis(5))).unwrap();
        assert!(matches!(
            driver.poll(PollMode::Interval(Duration::from_millis(5))),
            Err(ThermoError::AlreadyPolling)
        ));
        driver.close().await.unwrap();
        driver.close().await.unwrap();
        assert!(!driver.is_polling());
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let chip = FakeChip::with_code(ZERO_C);
        let mut driver = driver(&chip);
        assert!(matches!(
            driver.poll(PollMode::Interval(Duration::ZERO)),
            Err(ThermoError::Config(_))
        ));
        assert!(!driver.is_polling());

        let mut rx = driver.poll(PollMode::Interval(Duration::from_millis(5))).unwrap();
        assert!(rx.recv().await.is_some());
        driver.close().await.unwrap();
    }

    #[tokio::test]
    async fn polling_continues_after_stream_dropped() {
        let chip = FakeChip::with_code(ZERO_C);
        let mut driver = driver(&chip);
        drop(driver.poll(PollMode::Interval(Duration::from_millis(2))).unwrap());

        tokio::time::sleep(Duration::from_millis(50)).await;
        driver.close().await.unwrap();
        assert!(!driver.get_readings().is_empty());
    }

    #[tokio::test]
    async fn interrupt_mode_requires_source() {
        let chip = FakeChip::with_code(ZERO_C);
        let mut driver = driver(&chip);
        assert!(matches!(
            driver.poll(PollMode::Interrupt),
            Err(ThermoError::Unsupported(_))
        ));
        assert!(!driver.is_polling());
    }

    #[tokio::test]
    async fn interrupt_mode_samples_per_edge() {
        let chip = FakeChip::with_code(ZERO_C);
        let line = ManualInterrupt::default();
        let mut driver = driver(&chip).with_interrupt(line.clone());

        let mut rx = driver.poll(PollMode::Interrupt).unwrap();
        assert!(line.is_open());

        assert!(matches!(line.fire(), Some(Ok(()))));
        let r = rx.recv().await.unwrap();
        assert!(r.is_ok());

        driver.close().await.unwrap();
        assert!(!line.is_open());
        assert!(line.fire().is_none());
    }

    #[tokio::test]
    async fn interrupt_flood_reports_too_many_triggers() {
        let chip = FakeChip::with_code(ZERO_C);
        let line = ManualInterrupt::default();
        let mut driver = driver(&chip).with_interrupt(line.clone());
        let mut rx = driver.poll(PollMode::Interrupt).unwrap();

        // The poll loop cannot run until this task yields.
        let results: Vec<_> = (0..TRIGGER_QUEUE + 3).filter_map(|_| line.fire()).collect();
        assert!(results[..TRIGGER_QUEUE].iter().all(|r| r.is_ok()));
        assert!(results[TRIGGER_QUEUE..]
            .iter()
            .all(|r| matches!(r, Err(ThermoError::TooManyTriggers))));

        for _ in 0..TRIGGER_QUEUE {
            assert!(rx.recv().await.is_some());
        }
        driver.close().await.unwrap();
    }
}
