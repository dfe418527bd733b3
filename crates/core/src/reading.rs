use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// One sample published by a driver's poll loop.
///
/// Sample-level failures travel in `error` instead of stopping the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Device identifier the sample came from.
    pub id: String,
    /// Corrected temperature in °C, `None` when the sample failed.
    pub value: Option<f64>,
    /// Raw register content as read from the device, when available.
    pub raw: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl Reading {
    pub fn ok(id: impl Into<String>, value: f64, raw: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: Some(value),
            raw: Some(raw.into()),
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl ToString) -> Self {
        Self {
            id: id.into(),
            value: None,
            raw: None,
            timestamp: Utc::now(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Latest supervisor snapshot; `value` is the rolling average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Temperature {
    pub id: String,
    pub value: f64,
    pub timestamp: Option<DateTime<Utc>>,
    pub enabled: bool,
    /// Error carried by the most recent sample, if it failed.
    pub error: Option<String>,
}

/// How a driver decides when to take the next sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// Sample on a fixed timer.
    Interval(Duration),
    /// Sample whenever the hardware signals a finished conversion.
    Interrupt,
}

impl Default for PollMode {
    fn default() -> Self {
        PollMode::Interval(Duration::from_secs(1))
    }
}

/// User-facing configuration of one supervised sensor.
///
/// `S` carries the family-specific driver parameters (resolution, wiring…).
#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig<S> {
    pub id: String,
    /// Correction added to every sample, °C.
    pub offset: f64,
    pub poll: PollMode,
    /// Rolling-average capacity.
    pub samples: usize,
    pub enabled: bool,
    pub settings: S,
}

impl<S: Default> SensorConfig<S> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            offset: 0.0,
            poll: PollMode::default(),
            samples: 1,
            enabled: false,
            settings: S::default(),
        }
    }
}
