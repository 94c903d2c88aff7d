//! Position samples reported by vehicle/driver devices

use crate::domain::error::EngineError;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Default GPS accuracy when the device does not report one
const DEFAULT_ACCURACY_M: f64 = 10.0;

/// A single reported position. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub lat: f64,
    pub lng: f64,
    /// Epoch milliseconds; filled with "now" when the device omits it
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
    #[serde(default = "default_accuracy")]
    pub accuracy_m: f64,
}

fn default_accuracy() -> f64 {
    DEFAULT_ACCURACY_M
}

impl PositionSample {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng, timestamp_ms: None, accuracy_m: DEFAULT_ACCURACY_M }
    }

    pub fn with_timestamp(mut self, ts: u64) -> Self {
        self.timestamp_ms = Some(ts);
        self
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = accuracy_m;
        self
    }

    /// Validate coordinate ranges and accuracy. Out-of-range values are a
    /// hard validation error, never silently clamped.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(EngineError::Validation(format!("latitude out of range: {}", self.lat)));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(EngineError::Validation(format!("longitude out of range: {}", self.lng)));
        }
        if !self.accuracy_m.is_finite() || self.accuracy_m < 0.0 {
            return Err(EngineError::Validation(format!(
                "accuracy must be non-negative: {}",
                self.accuracy_m
            )));
        }
        Ok(())
    }

    /// Timestamp, resolved against the given "now" when the device omitted it
    pub fn timestamp_or(&self, now_ms: u64) -> u64 {
        self.timestamp_ms.unwrap_or(now_ms)
    }
}
