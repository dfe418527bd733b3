use crate::driver::RtdDriver;
use crate::register::RtdConfigRegister;
use thermo_core::{PollMode, PollingSensorSupervisor, Reading, Result, SensorHandler};
use tokio::sync::mpsc;

/// Supervised RTD channel.
pub type RtdSensor = PollingSensorSupervisor<RtdHandler>;

/// Adapts [`RtdDriver`] to the supervisor state machine.
pub struct RtdHandler {
    driver: RtdDriver,
}

impl RtdHandler {
    pub fn new(driver: RtdDriver) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &RtdDriver {
        &self.driver
    }
}

impl SensorHandler for RtdHandler {
    type Settings = RtdConfigRegister;

    fn id(&self) -> &str {
        self.driver.id()
    }

    async fn configure(&mut self, register: &RtdConfigRegister, offset: f64) -> Result<()> {
        if self.driver.register() != *register {
            self.driver.apply(*register).await?;
        }
        self.driver.set_offset(offset);
        Ok(())
    }

    fn start_polling(&mut self, mode: PollMode) -> Result<mpsc::Receiver<Reading>> {
        self.driver.poll(mode)
    }

    async fn stop_polling(&mut self) -> Result<()> {
        self.driver.close().await
    }

    async fn sample_once(&mut self) -> Result<Reading> {
        self.driver.sample().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{MainsFilter, Wiring, REG_CONFIG};
    use crate::transport::fake::{FakeChip, ManualInterrupt};
    use std::time::Duration;
    use thermo_core::SensorConfig;

    const ZERO_C: u16 = 7620;

    fn config(enabled: bool) -> SensorConfig<RtdConfigRegister> {
        SensorConfig {
            offset: 0.5,
            poll: PollMode::Interval(Duration::from_millis(5)),
            samples: 3,
            enabled,
            ..SensorConfig::new("rtd0")
        }
    }

    async fn sensor(chip: &FakeChip, config: SensorConfig<RtdConfigRegister>) -> RtdSensor {
        let driver = RtdDriver::new("rtd0", chip.clone(), RtdConfigRegister::default()).unwrap();
        RtdSensor::new(RtdHandler::new(driver), config).await.unwrap()
    }

    #[tokio::test]
    async fn supervised_polling_applies_offset() {
        let chip = FakeChip::with_code(ZERO_C);
        let mut sup = sensor(&chip, config(true)).await;

        let mut updates = sup.subscribe();
        tokio::time::timeout(Duration::from_secs(2), updates.changed())
            .await
            .expect("no snapshot published")
            .unwrap();

        let t = sup.temperature();
        assert!((t.value - 0.5).abs() < 0.05, "{}", t.value);
        assert!(t.enabled);

        sup.close().await.unwrap();
        assert!(!sup.handler().driver().is_polling());
        assert!(!sup.handler().driver().get_readings().is_empty());
    }

    #[tokio::test]
    async fn register_change_is_written() {
        let chip = FakeChip::with_code(ZERO_C);
        let mut sup = sensor(&chip, config(false)).await;
        let writes = chip.state().writes.len();

        let mut next = config(false);
        next.settings = RtdConfigRegister {
            wiring: Wiring::ThreeWire,
            filter: MainsFilter::Hz50,
            ..RtdConfigRegister::default()
        };
        sup.set_config(next).await.unwrap();

        let state = chip.state();
        assert_eq!(state.writes.len(), writes + 1);
        assert_eq!(state.regs[REG_CONFIG as usize], 0b1101_0000);
    }

    #[tokio::test]
    async fn offset_only_change_skips_register_write() {
        let chip = FakeChip::with_code(ZERO_C);
        let mut sup = sensor(&chip, config(false)).await;
        let writes = chip.state().writes.len();

        let mut next = config(false);
        next.offset = -1.0;
        sup.set_config(next).await.unwrap();

        assert_eq!(chip.state().writes.len(), writes);
        assert_eq!(sup.handler().driver().offset(), -1.0);
    }

    #[tokio::test]
    async fn switching_to_interrupt_restarts_polling() {
        let chip = FakeChip::with_code(ZERO_C);
        let line = ManualInterrupt::default();
        let driver = RtdDriver::new("rtd0", chip.clone(), RtdConfigRegister::default())
            .unwrap()
            .with_interrupt(line.clone());
        let mut sup = RtdSensor::new(RtdHandler::new(driver), config(true))
            .await
            .unwrap();
        assert!(!line.is_open());

        let mut next = config(true);
        next.poll = PollMode::Interrupt;
        sup.set_config(next).await.unwrap();
        assert!(sup.is_polling());
        assert!(line.is_open());

        let mut updates = sup.subscribe();
        assert!(matches!(line.fire(), Some(Ok(()))));
        tokio::time::timeout(Duration::from_secs(2), updates.changed())
            .await
            .expect("no snapshot published")
            .unwrap();

        sup.stop_poll().await.unwrap();
        assert!(!line.is_open());
        assert!(!sup.config().enabled);
    }

    #[tokio::test]
    async fn sample_once_reports_faults() {
        let chip = FakeChip::with_code(ZERO_C);
        let mut sup = sensor(&chip, config(false)).await;
        chip.set_fault(0x04);

        let reading = sup.sample_once().await.unwrap();
        assert!(!reading.is_ok());
        assert!(reading.error.unwrap().contains("undervoltage"));
        assert!(sup.sample_once().await.unwrap().is_ok());
    }
}
