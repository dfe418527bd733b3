use crate::average::RollingAverage;
use crate::reading::{PollMode, Reading, SensorConfig, Temperature};
use crate::{lock, Result, ThermoError};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The per-family half of a supervised sensor.
///
/// Implemented once per sensor family; [`PollingSensorSupervisor`] drives the
/// shared enable/disable state machine on top of it.
pub trait SensorHandler: Send + 'static {
    /// Driver-level parameters pushed to the device on change.
    type Settings: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    fn id(&self) -> &str;

    /// Push driver parameters and the correction offset to the device.
    fn configure(
        &mut self,
        settings: &Self::Settings,
        offset: f64,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Start the driver's poll loop and hand back its reading stream.
    fn start_polling(&mut self, mode: PollMode) -> Result<mpsc::Receiver<Reading>>;

    /// Stop the poll loop, returning once it has fully terminated.
    fn stop_polling(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Take one sample outside of the poll loop.
    fn sample_once(&mut self) -> impl Future<Output = Result<Reading>> + Send;
}

/// Lifecycle wrapper combining a driver with a rolling average.
///
/// States are `Idle` and `Active`; [`temperature`](Self::temperature) never
/// waits on the poll loop.
pub struct PollingSensorSupervisor<H: SensorHandler> {
    handler:  H,
    config:   SensorConfig<H::Settings>,
    average:  Arc<Mutex<RollingAverage>>,
    latest:   Arc<watch::Sender<Temperature>>,
    consumer: Option<JoinHandle<()>>,
}

impl<H: SensorHandler> PollingSensorSupervisor<H> {
    /// Wrap `handler`, push `config` to it and start polling if enabled.
    pub async fn new(mut handler: H, mut config: SensorConfig<H::Settings>) -> Result<Self> {
        let average = RollingAverage::new(config.samples)?;
        handler.configure(&config.settings, config.offset).await?;

        let enabled = config.enabled;
        config.id = handler.id().to_string();
        config.enabled = false;

        let (latest, _) = watch::channel(Temperature {
            id: config.id.clone(),
            value: 0.0,
            timestamp: None,
            enabled: false,
            error: None,
        });

        let mut supervisor = Self {
            handler,
            config,
            average: Arc::new(Mutex::new(average)),
            latest: Arc::new(latest),
            consumer: None,
        };
        if enabled {
            supervisor.poll()?;
        }
        Ok(supervisor)
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &SensorConfig<H::Settings> {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn is_polling(&self) -> bool {
        self.consumer.is_some()
    }

    /// `Idle → Active`: start the driver and a consumer feeding the average.
    pub fn poll(&mut self) -> Result<()> {
        if self.consumer.is_some() {
            return Err(ThermoError::AlreadyPolling);
        }

        let readings = self.handler.start_polling(self.config.poll)?;
        self.consumer = Some(tokio::spawn(consume(
            readings,
            Arc::clone(&self.average),
            Arc::clone(&self.latest),
        )));
        self.config.enabled = true;

        info!(sensor = %self.config.id, mode = ?self.config.poll, "polling started");
        Ok(())
    }

    /// `Active → Idle`.
    ///
    /// The consumer keeps draining while the driver winds down; once the
    /// driver has closed its stream the consumer ends on its own.
    pub async fn stop_poll(&mut self) -> Result<()> {
        let Some(consumer) = self.consumer.take() else {
            return Err(ThermoError::NotPolling);
        };
        self.config.enabled = false;

        match self.handler.stop_polling().await {
            Ok(()) => {
                consumer.await?;
                info!(sensor = %self.config.id, "polling stopped");
                Ok(())
            }
            Err(e) => {
                consumer.abort();
                Err(e)
            }
        }
    }

    /// Apply a new configuration.
    ///
    /// Steps run in order, each aborting the rest on failure: driver
    /// parameters, averaging window and interval, enabled state. An active
    /// poll loop restarts when its mode or the driver settings change, so
    /// pacing derived from the settings is recomputed.
    pub async fn set_config(&mut self, new: SensorConfig<H::Settings>) -> Result<()> {
        if new.samples == 0 {
            return Err(ThermoError::InvalidCapacity(0));
        }

        let settings_changed = new.settings != self.config.settings;
        if settings_changed || new.offset != self.config.offset {
            self.handler.configure(&new.settings, new.offset).await?;
            self.config.settings = new.settings;
            self.config.offset = new.offset;
        }

        lock(&self.average).resize(new.samples)?;
        self.config.samples = new.samples;
        let poll_changed = new.poll != self.config.poll;
        self.config.poll = new.poll;

        match (new.enabled, self.is_polling()) {
            (true, false) => self.poll()?,
            (false, true) => self.stop_poll().await?,
            (true, true) if poll_changed || settings_changed => {
                debug!(sensor = %self.config.id, "poll mode or settings changed; restarting");
                self.stop_poll().await?;
                self.poll()?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Latest rolling-average snapshot.
    pub fn temperature(&self) -> Temperature {
        let mut snapshot = self.latest.borrow().clone();
        snapshot.enabled = self.config.enabled;
        snapshot
    }

    /// Receiver notified every time the consumer publishes a snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Temperature> {
        self.latest.subscribe()
    }

    pub async fn sample_once(&mut self) -> Result<Reading> {
        self.handler.sample_once().await
    }

    /// Stop polling if active. A no-op when idle.
    pub async fn close(&mut self) -> Result<()> {
        if self.is_polling() {
            self.stop_poll().await?;
        }
        Ok(())
    }
}

async fn consume(
    mut readings: mpsc::Receiver<Reading>,
    average: Arc<Mutex<RollingAverage>>,
    latest: Arc<watch::Sender<Temperature>>,
) {
    while let Some(reading) = readings.recv().await {
        let value = {
            let mut average = lock(&average);
            if let Some(v) = reading.value {
                average.add(v);
            }
            average.average()
        };

        if let Some(err) = &reading.error {
            warn!(sensor = %reading.id, "sample failed: {err}");
        }

        latest.send_modify(|t| {
            t.value = value;
            t.timestamp = Some(reading.timestamp);
            t.error = reading.error;
        });
    }
}
