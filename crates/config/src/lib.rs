pub mod schema;
pub mod watcher;

pub use schema::{GlobalConfig, SensorEntry, ThermoConfig};
pub use watcher::ConfigWatcher;

use std::path::{Path, PathBuf};
use thermo_core::{Result, ThermoError};

/// Read the daemon configuration at `path`.
///
/// A missing file is not an error: the default configuration lists no
/// sensors, and the daemon then supervises every device it discovers on the
/// bus. A sensor id listed twice is rejected, since each id maps to a single
/// supervisor.
pub fn load(path: impl AsRef<Path>) -> Result<ThermoConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            "No config at '{}'; supervising every discovered sensor.",
            path.display()
        );
        return Ok(ThermoConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| ThermoError::Config(format!("cannot read '{}': {e}", path.display())))?;
    let config: ThermoConfig = toml::from_str(&raw)
        .map_err(|e| ThermoError::Config(format!("{}: {e}", path.display())))?;

    for (i, sensor) in config.sensors.iter().enumerate() {
        if config.sensors[..i].iter().any(|earlier| earlier.id == sensor.id) {
            return Err(ThermoError::Config(format!("sensor '{}' listed twice", sensor.id)));
        }
    }
    Ok(config)
}

/// Return the default config path, honouring `$XDG_CONFIG_HOME`.
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("thermo").join("thermo.toml")
}
