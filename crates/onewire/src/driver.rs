use crate::transport::OneWireTransport;
use crate::value::{RawWireValue, Resolution};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thermo_core::{Reading, Result, ThermoError};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Readings buffered between the poll loop and its consumer.
const READING_BUFFER: usize = 16;

/// Register access for one device; cheap to clone into blocking tasks.
#[derive(Clone)]
struct Device {
    transport:   Arc<dyn OneWireTransport>,
    id:          String,
    temperature: PathBuf,
    resolution:  PathBuf,
    /// Correction offset stored as `f64` bits so a running loop sees updates.
    offset:      Arc<AtomicU64>,
}

impl Device {
    fn read_resolution(&self) -> Result<Resolution> {
        self.transport.read(&self.resolution)?.parse()
    }

    fn set_resolution(&self, resolution: Resolution) -> Result<()> {
        self.transport
            .write(&self.resolution, &resolution.bits().to_string())?;
        debug!(sensor = %self.id, %resolution, "resolution set");
        Ok(())
    }

    fn read_temperature(&self) -> Result<RawWireValue> {
        let text = self.transport.read(&self.temperature)?;
        Ok(RawWireValue::new(&text))
    }

    fn sample(&self) -> Reading {
        let offset = f64::from_bits(self.offset.load(Ordering::Relaxed));
        match self.read_temperature() {
            Ok(raw) => match raw.celsius() {
                Ok(celsius) => Reading::ok(&self.id, celsius + offset, raw.as_str()),
                Err(e) => Reading {
                    raw: Some(raw.to_string()),
                    ..Reading::failed(&self.id, e)
                },
            },
            Err(e) => Reading::failed(&self.id, e),
        }
    }
}

struct PollHandle {
    interval: Duration,
    stop:     oneshot::Sender<()>,
    done:     oneshot::Receiver<()>,
}

/// Driver for a single one-wire thermometer.
pub struct OneWireSensorDriver {
    device:  Device,
    polling: Option<PollHandle>,
}

impl OneWireSensorDriver {
    pub fn new(transport: Arc<dyn OneWireTransport>, base_path: &Path, id: &str) -> Self {
        let dir = base_path.join(id);
        Self {
            device: Device {
                transport,
                id: id.to_string(),
                temperature: dir.join("temperature"),
                resolution: dir.join("resolution"),
                offset: Arc::new(AtomicU64::new(0f64.to_bits())),
            },
            polling: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.device.id
    }

    pub fn is_polling(&self) -> bool {
        self.polling.is_some()
    }

    /// Pace of the running poll loop.
    pub fn poll_interval(&self) -> Option<Duration> {
        self.polling.as_ref().map(|handle| handle.interval)
    }

    pub fn read_resolution(&self) -> Result<Resolution> {
        self.device.read_resolution()
    }

    pub fn set_resolution(&self, resolution: Resolution) -> Result<()> {
        self.device.set_resolution(resolution)
    }

    /// [`set_resolution`](Self::set_resolution) on the blocking pool.
    pub async fn apply_resolution(&self, resolution: Resolution) -> Result<()> {
        self.blocking(move |device| device.set_resolution(resolution)).await
    }

    /// Read the undecoded temperature attribute.
    pub fn read_temperature(&self) -> Result<RawWireValue> {
        self.device.read_temperature()
    }

    /// Correction added to every polled sample.
    pub fn set_offset(&self, offset: f64) {
        self.device.offset.store(offset.to_bits(), Ordering::Relaxed);
    }

    pub fn offset(&self) -> f64 {
        f64::from_bits(self.device.offset.load(Ordering::Relaxed))
    }

    /// Take one corrected sample on the blocking pool.
    pub async fn sample(&self) -> Result<Reading> {
        self.blocking(|device| Ok(device.sample())).await
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Device) -> Result<T> + Send + 'static,
    {
        let device = self.device.clone();
        tokio::task::spawn_blocking(move || op(&device)).await?
    }

    /// Start sampling every `interval` on a background task.
    ///
    /// Decode failures travel inside the published readings.
    pub fn poll(&mut self, interval: Duration) -> Result<mpsc::Receiver<Reading>> {
        if self.polling.is_some() {
            return Err(ThermoError::AlreadyPolling);
        }

        let (tx, rx) = mpsc::channel(READING_BUFFER);
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(poll_loop(self.device.clone(), interval, tx, stop_rx, done_tx));
        self.polling = Some(PollHandle {
            interval,
            stop: stop_tx,
            done: done_rx,
        });

        info!(sensor = %self.device.id, ?interval, "one-wire polling started");
        Ok(rx)
    }

    /// Stop polling and wait for the background task to finish.
    ///
    /// A no-op when not polling. Readings already buffered stay readable on
    /// the stream until it reports closed.
    pub async fn close(&mut self) -> Result<()> {
        let Some(handle) = self.polling.take() else {
            return Ok(());
        };

        let _ = handle.stop.send(());
        // Sender dropped without a send means the loop ended on its own.
        let _ = handle.done.await;

        info!(sensor = %self.device.id, "one-wire polling stopped");
        Ok(())
    }
}

async fn poll_loop(
    device: Device,
    interval: Duration,
    readings: mpsc::Sender<Reading>,
    mut stop: oneshot::Receiver<()>,
    done: oneshot::Sender<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = tokio::time::sleep(interval) => {}
        }

        // The sample always completes before a stop is honoured.
        let sampler = device.clone();
        let reading = match tokio::task::spawn_blocking(move || sampler.sample()).await {
            Ok(reading) => reading,
            Err(e) => Reading::failed(&device.id, e),
        };
        debug!(sensor = %device.id, value = ?reading.value, "sampled");

        tokio::select! {
            _ = &mut stop => break,
            sent = readings.send(reading) => {
                if sent.is_err() {
                    break; // reader dropped
                }
            }
        }
    }

    drop(readings);
    let _ = done.send(());
}
