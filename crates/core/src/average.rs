use crate::{Result, ThermoError};
use std::collections::VecDeque;

/// Bounded history of samples exposing their arithmetic mean.
///
/// The oldest sample is evicted first once `capacity` is reached. Not
/// internally synchronised; owners wrap it in a lock when more than one
/// context touches it.
#[derive(Debug, Clone)]
pub struct RollingAverage {
    samples:  VecDeque<f64>,
    capacity: usize,
}

impl RollingAverage {
    /// Create an empty accumulator. A capacity of zero is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ThermoError::InvalidCapacity(capacity));
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Push a new sample, evicting the oldest if at capacity.
    pub fn add(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Mean of the retained samples, `0.0` when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Change the capacity.
    ///
    /// Growing never drops data; shrinking keeps the most recent
    /// `new_capacity` samples.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity == 0 {
            return Err(ThermoError::InvalidCapacity(new_capacity));
        }
        while self.samples.len() > new_capacity {
            self.samples.pop_front();
        }
        self.capacity = new_capacity;
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Retained samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}
