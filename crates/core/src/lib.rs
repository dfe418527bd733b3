pub mod average;
pub mod error;
pub mod reading;
pub mod supervisor;

pub use average::RollingAverage;
pub use error::{Result, ThermoError};
pub use reading::{PollMode, Reading, SensorConfig, Temperature};
pub use supervisor::{PollingSensorSupervisor, SensorHandler};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every guarded value in this workspace stays consistent between
/// statements, so a poisoned lock is still safe to use.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
