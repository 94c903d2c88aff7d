//! Auto-checkout zone configuration, one per enabled parking lot

use crate::domain::ticket::ParkingId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Newtype wrapper for IoT sensor IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SensorId(pub String);

impl std::fmt::Display for SensorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a lot detects that a vehicle has left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    Geolocation,
    Sensor,
    Hybrid,
}

impl DetectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMode::Geolocation => "geolocation",
            DetectionMode::Sensor => "sensor",
            DetectionMode::Hybrid => "hybrid",
        }
    }

    /// Geolocation exits apply to geolocation and hybrid zones
    pub fn accepts_geolocation(&self) -> bool {
        matches!(self, DetectionMode::Geolocation | DetectionMode::Hybrid)
    }

    /// Sensor exits apply to sensor and hybrid zones
    pub fn accepts_sensor(&self) -> bool {
        matches!(self, DetectionMode::Sensor | DetectionMode::Hybrid)
    }
}

/// A plain lat/lng point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

pub const DEFAULT_EXIT_RADIUS_M: f64 = 100.0;
pub const DEFAULT_CONFIRMATION_DELAY_SECS: u32 = 30;

/// Per-lot auto-checkout configuration.
///
/// Loaded once at startup from the external config store and owned by the
/// `ZoneRegistry` for the lifetime of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub parking_id: ParkingId,
    pub mode: DetectionMode,
    /// Registered lot center used for radius checks
    pub center: GeoPoint,
    #[serde(default = "default_exit_radius")]
    pub exit_radius_m: f64,
    #[serde(default = "default_confirmation_delay")]
    pub confirmation_delay_secs: u32,
    /// Carried through from configuration for forward compatibility; the
    /// exit decision evaluates radius only, not polygon containment.
    #[serde(default)]
    pub exit_zones: Vec<GeoPoint>,
    /// Sensors bound to this lot
    #[serde(default)]
    pub sensor_ids: HashSet<SensorId>,
}

fn default_exit_radius() -> f64 {
    DEFAULT_EXIT_RADIUS_M
}

fn default_confirmation_delay() -> u32 {
    DEFAULT_CONFIRMATION_DELAY_SECS
}

impl ZoneConfig {
    pub fn new(parking_id: ParkingId, mode: DetectionMode, center: GeoPoint) -> Self {
        Self {
            parking_id,
            mode,
            center,
            exit_radius_m: DEFAULT_EXIT_RADIUS_M,
            confirmation_delay_secs: DEFAULT_CONFIRMATION_DELAY_SECS,
            exit_zones: Vec::new(),
            sensor_ids: HashSet::new(),
        }
    }

    pub fn with_radius(mut self, radius_m: f64) -> Self {
        self.exit_radius_m = radius_m;
        self
    }

    pub fn with_delay(mut self, delay_secs: u32) -> Self {
        self.confirmation_delay_secs = delay_secs;
        self
    }

    pub fn with_sensor(mut self, sensor: SensorId) -> Self {
        self.sensor_ids.insert(sensor);
        self
    }

    pub fn has_sensor(&self, sensor: &SensorId) -> bool {
        self.sensor_ids.contains(sensor)
    }
}
