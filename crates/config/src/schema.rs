use serde::{Deserialize, Serialize};
use std::time::Duration;
use thermo_core::{PollMode, SensorConfig};

/// Root configuration structure parsed from `thermo.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ThermoConfig {
    pub global:  GlobalConfig,
    /// One entry per supervised sensor, keyed by device id.
    pub sensors: Vec<SensorEntry>,
}

impl ThermoConfig {
    pub fn sensor(&self, id: &str) -> Option<&SensorEntry> {
        self.sensors.iter().find(|s| s.id == id)
    }
}

/// Daemon-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// How often snapshots are reported, in milliseconds.
    pub report_interval_ms: u64,
    /// Root of the one-wire device tree.
    pub base_path: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            report_interval_ms: 5000,
            base_path:          "/sys/bus/w1/devices".to_string(),
        }
    }
}

impl GlobalConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms.max(1))
    }
}

/// Config block for a single sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorEntry {
    pub id:          String,
    /// Correction added to every reading, °C.
    pub offset:      f64,
    pub interval_ms: u64,
    /// Rolling-average capacity.
    pub samples:     usize,
    pub enabled:     bool,
    /// Converter resolution in bits.
    pub resolution:  u8,
}

impl Default for SensorEntry {
    fn default() -> Self {
        Self {
            id:          String::new(),
            offset:      0.0,
            interval_ms: 1000,
            samples:     10,
            enabled:     true,
            resolution:  12,
        }
    }
}

impl SensorEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Supervisor configuration for this entry with family-specific `settings`.
    pub fn sensor_config<S>(&self, settings: S) -> SensorConfig<S> {
        SensorConfig {
            id: self.id.clone(),
            offset: self.offset,
            poll: PollMode::Interval(Duration::from_millis(self.interval_ms)),
            samples: self.samples,
            enabled: self.enabled,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: ThermoConfig = toml::from_str(
            r#"
            [global]
            report_interval_ms = 250

            [[sensors]]
            id = "28-051693848dff"
            offset = -0.5
            resolution = 9

            [[sensors]]
            id = "28-05169397aeff"
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.global.report_interval(), Duration::from_millis(250));
        assert_eq!(config.global.base_path, "/sys/bus/w1/devices");
        assert_eq!(config.sensors.len(), 2);

        let first = config.sensor("28-051693848dff").unwrap();
        assert_eq!(first.offset, -0.5);
        assert_eq!(first.resolution, 9);
        assert_eq!(first.samples, 10);
        assert!(first.enabled);
        assert!(!config.sensor("28-05169397aeff").unwrap().enabled);
        assert!(config.sensor("missing").is_none());
    }

    #[test]
    fn entry_maps_to_supervisor_config() {
        let entry = SensorEntry {
            interval_ms: 250,
            samples: 4,
            ..SensorEntry::new("28-1")
        };
        let config = entry.sensor_config(12u8);
        assert_eq!(config.id, "28-1");
        assert_eq!(config.poll, PollMode::Interval(Duration::from_millis(250)));
        assert_eq!(config.samples, 4);
        assert_eq!(config.settings, 12);
        assert!(config.enabled);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let config: ThermoConfig = toml::from_str("colour = \"red\"\n[global]\nbase_path = \"/w1\"\n").unwrap();
        assert_eq!(config.global.base_path, "/w1");
        assert!(config.sensors.is_empty());
    }
}
