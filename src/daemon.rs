use std::collections::BTreeMap;
use std::io::Write;
use thermo_config::{SensorEntry, ThermoConfig};
use thermo_core::{Result, ThermoError};
use thermo_onewire::{OneWireBus, OneWireHandler, OneWireSensor, Resolution};
use tracing::{info, warn};

/// Owns the bus and one supervisor per configured sensor.
pub struct Daemon {
    bus:     OneWireBus,
    config:  ThermoConfig,
    sensors: BTreeMap<String, OneWireSensor>,
}

impl Daemon {
    pub async fn start(config: ThermoConfig) -> Self {
        let mut daemon = Self {
            bus:     OneWireBus::with_base_path(&config.global.base_path),
            config:  ThermoConfig::default(),
            sensors: BTreeMap::new(),
        };
        daemon.apply(config).await;
        daemon
    }

    pub fn config(&self) -> &ThermoConfig {
        &self.config
    }

    pub fn sensor(&self, id: &str) -> Option<&OneWireSensor> {
        self.sensors.get(id)
    }

    pub fn sensor_ids(&self) -> impl Iterator<Item = &str> {
        self.sensors.keys().map(String::as_str)
    }

    /// Reconcile running supervisors with `config`.
    ///
    /// Sensors missing from the new file are stopped, new ones are started
    /// and the rest are reconfigured in place. A failure only affects the
    /// sensor it belongs to.
    pub async fn apply(&mut self, config: ThermoConfig) {
        if self.bus.base_path() != std::path::Path::new(&config.global.base_path) {
            info!("One-wire base path is now {}", config.global.base_path);
            self.stop_all().await;
            self.bus = OneWireBus::with_base_path(&config.global.base_path);
        }

        let entries = self.entries(&config);

        let removed: Vec<String> = self
            .sensors
            .keys()
            .filter(|id| !entries.iter().any(|e| &e.id == *id))
            .cloned()
            .collect();
        for id in removed {
            if let Some(mut sensor) = self.sensors.remove(&id) {
                info!(sensor = %id, "sensor removed from config");
                if let Err(e) = sensor.close().await {
                    warn!(sensor = %id, "failed to stop sensor: {e}");
                }
            }
        }

        for entry in &entries {
            if let Err(e) = self.apply_entry(entry).await {
                warn!(sensor = %entry.id, "cannot apply sensor config: {e}");
            }
        }

        self.config = config;
    }

    /// The configured sensors, or every device on the bus with default
    /// settings when none are listed.
    fn entries(&self, config: &ThermoConfig) -> Vec<SensorEntry> {
        if !config.sensors.is_empty() {
            return config.sensors.clone();
        }
        match self.bus.discover() {
            Ok(ids) => ids.into_iter().map(SensorEntry::new).collect(),
            Err(e) => {
                warn!("One-wire discovery failed: {e}");
                Vec::new()
            }
        }
    }

    async fn apply_entry(&mut self, entry: &SensorEntry) -> Result<()> {
        let config = entry.sensor_config(Resolution::try_from(entry.resolution)?);

        if let Some(sensor) = self.sensors.get_mut(&entry.id) {
            return sensor.set_config(config).await;
        }

        let driver = self.bus.new_sensor(&entry.id)?;
        let sensor = OneWireSensor::new(OneWireHandler::new(driver), config).await?;
        info!(sensor = %entry.id, enabled = entry.enabled, "sensor started");
        self.sensors.insert(entry.id.clone(), sensor);
        Ok(())
    }

    /// Write every snapshot as one JSON line.
    pub fn report(&self, out: &mut impl Write) -> Result<()> {
        for sensor in self.sensors.values() {
            let line = serde_json::to_string(&sensor.temperature())
                .map_err(|e| ThermoError::Parse(e.to_string()))?;
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }

    pub async fn stop_all(&mut self) {
        for (id, mut sensor) in std::mem::take(&mut self.sensors) {
            if let Err(e) = sensor.close().await {
                warn!(sensor = %id, "failed to stop sensor: {e}");
            }
        }
    }
}
