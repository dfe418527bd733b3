use crate::driver::OneWireSensorDriver;
use crate::value::Resolution;
use thermo_core::{
    PollMode, PollingSensorSupervisor, Reading, Result, SensorHandler, ThermoError,
};
use tokio::sync::mpsc;

/// Supervised one-wire thermometer.
pub type OneWireSensor = PollingSensorSupervisor<OneWireHandler>;

/// Adapts [`OneWireSensorDriver`] to the supervisor state machine.
pub struct OneWireHandler {
    driver:     OneWireSensorDriver,
    resolution: Resolution,
}

impl OneWireHandler {
    pub fn new(driver: OneWireSensorDriver) -> Self {
        Self {
            driver,
            resolution: Resolution::default(),
        }
    }

    pub fn driver(&self) -> &OneWireSensorDriver {
        &self.driver
    }
}

impl SensorHandler for OneWireHandler {
    type Settings = Resolution;

    fn id(&self) -> &str {
        self.driver.id()
    }

    async fn configure(&mut self, resolution: &Resolution, offset: f64) -> Result<()> {
        self.driver.apply_resolution(*resolution).await?;
        self.resolution = *resolution;
        self.driver.set_offset(offset);
        Ok(())
    }

    /// Timer-driven only; the interval never undercuts the conversion time.
    fn start_polling(&mut self, mode: PollMode) -> Result<mpsc::Receiver<Reading>> {
        match mode {
            PollMode::Interval(interval) => self
                .driver
                .poll(interval.max(self.resolution.conversion_time())),
            PollMode::Interrupt => Err(ThermoError::Unsupported(
                "interrupt-driven polling on a one-wire bus".into(),
            )),
        }
    }

    async fn stop_polling(&mut self) -> Result<()> {
        self.driver.close().await
    }

    async fn sample_once(&mut self) -> Result<Reading> {
        self.driver.sample().await
    }
}
