use crate::driver::OneWireSensorDriver;
use crate::transport::{OneWireTransport, SysfsTransport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thermo_core::{Result, ThermoError};
use tracing::debug;

/// Where the kernel `w1` subsystem exposes attached devices.
pub const DEFAULT_BASE_PATH: &str = "/sys/bus/w1/devices";

/// Enumerates devices on a one-wire bus master.
///
/// Enumeration is re-read on every call, so devices appearing or
/// disappearing are observed immediately.
pub struct OneWireBus {
    transport: Arc<dyn OneWireTransport>,
    base_path: PathBuf,
}

impl Default for OneWireBus {
    fn default() -> Self {
        Self::new()
    }
}

impl OneWireBus {
    /// Bus backed by sysfs at [`DEFAULT_BASE_PATH`].
    pub fn new() -> Self {
        Self::with_base_path(DEFAULT_BASE_PATH)
    }

    /// Bus backed by sysfs rooted somewhere else.
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self::with_transport(Arc::new(SysfsTransport), base_path)
    }

    pub fn with_transport(
        transport: Arc<dyn OneWireTransport>,
        base_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Device identifiers currently on the bus, in enumeration order.
    ///
    /// Device directories start with their family code; bus-control
    /// entries such as `w1_bus_master1` do not start with a digit.
    pub fn discover(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = self
            .transport
            .list_dir(&self.base_path)?
            .into_iter()
            .filter(|name| name.starts_with(|c: char| c.is_ascii_digit()))
            .collect();
        debug!(count = ids.len(), path = %self.base_path.display(), "bus enumerated");
        Ok(ids)
    }

    /// Open a driver for `id` after one exploratory read.
    pub fn new_sensor(&self, id: &str) -> Result<OneWireSensorDriver> {
        if !self.discover()?.iter().any(|found| found == id) {
            return Err(ThermoError::NoSuchDevice(id.to_string()));
        }

        let driver = OneWireSensorDriver::new(Arc::clone(&self.transport), &self.base_path, id);
        driver.read_temperature()?;
        Ok(driver)
    }
}
