//! Checkout entity and state machine vocabulary
//!
//! A `Checkout` is the persisted subject of the coordinator's state machine:
//! created `Pending`, finished in exactly one of `Completed`, `Cancelled` or
//! `Failed`, never re-opened.

use crate::domain::position::PositionSample;
use crate::domain::ticket::{ParkingId, TicketId, UserId};
use crate::domain::zone::SensorId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable) checkout id
pub fn new_checkout_id() -> CheckoutId {
    CheckoutId(Uuid::now_v7().to_string())
}

/// Newtype wrapper for checkout IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct CheckoutId(pub String);

impl std::fmt::Display for CheckoutId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How this checkout was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMethod {
    Geolocation,
    Sensor,
    Manual,
}

impl CheckoutMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMethod::Geolocation => "geolocation",
            CheckoutMethod::Sensor => "sensor",
            CheckoutMethod::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl CheckoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStatus::Pending => "pending",
            CheckoutStatus::Completed => "completed",
            CheckoutStatus::Cancelled => "cancelled",
            CheckoutStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self != CheckoutStatus::Pending
    }
}

/// Method-specific metadata captured at initiation.
///
/// Modelled as a sum type for type safety; flattened to a JSON payload only
/// at the persistence boundary via [`CheckoutMeta::to_payload`].
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutMeta {
    Geolocation { exit_position: PositionSample },
    Sensor { sensor_id: SensorId, vehicle_ref: String },
    Manual { requested_by: UserId },
}

impl CheckoutMeta {
    pub fn method(&self) -> CheckoutMethod {
        match self {
            CheckoutMeta::Geolocation { .. } => CheckoutMethod::Geolocation,
            CheckoutMeta::Sensor { .. } => CheckoutMethod::Sensor,
            CheckoutMeta::Manual { .. } => CheckoutMethod::Manual,
        }
    }

    /// Flatten to the generic JSON payload stored on the checkout row
    pub fn to_payload(&self) -> serde_json::Value {
        match self {
            CheckoutMeta::Geolocation { exit_position } => serde_json::json!({
                "exit_position": {
                    "lat": exit_position.lat,
                    "lng": exit_position.lng,
                    "accuracy_m": exit_position.accuracy_m,
                    "timestamp_ms": exit_position.timestamp_ms,
                },
            }),
            CheckoutMeta::Sensor { sensor_id, vehicle_ref } => serde_json::json!({
                "sensor_id": sensor_id.0,
                "vehicle_ref": vehicle_ref,
            }),
            CheckoutMeta::Manual { requested_by } => serde_json::json!({
                "requested_by": requested_by.0,
            }),
        }
    }
}

/// Persisted checkout row
#[derive(Debug, Clone)]
pub struct Checkout {
    pub id: CheckoutId,
    pub ticket_id: TicketId,
    pub user_id: UserId,
    pub parking_id: ParkingId,
    pub method: CheckoutMethod,
    pub status: CheckoutStatus,
    pub initiated_at: u64,
    pub completed_at: Option<u64>,
    pub cancelled_at: Option<u64>,
    /// Computed once at confirmation, immutable after set
    pub final_amount: Option<f64>,
    pub meta: CheckoutMeta,
    pub error_message: Option<String>,
    pub cancel_reason: Option<String>,
}

impl Checkout {
    /// Create a fresh pending checkout for a ticket
    pub fn pending(
        ticket_id: TicketId,
        user_id: UserId,
        parking_id: ParkingId,
        meta: CheckoutMeta,
        initiated_at: u64,
    ) -> Self {
        Self {
            id: new_checkout_id(),
            ticket_id,
            user_id,
            parking_id,
            method: meta.method(),
            status: CheckoutStatus::Pending,
            initiated_at,
            completed_at: None,
            cancelled_at: None,
            final_amount: None,
            meta,
            error_message: None,
            cancel_reason: None,
        }
    }
}

/// Result of an entry-point call, distinguishing "nothing happened" from
/// "checkout opened" so callers and tests can assert no-ops explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    /// A pending checkout was persisted (and its confirmation scheduled)
    Initiated(CheckoutId),
    /// Expected noise, deliberately ignored
    Ignored(IgnoreReason),
    /// A storage call failed; logged, nothing billed, ticket untouched
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Sensor event whose action is not "exit"
    NotAnExit,
    /// Sensor not bound to any configured lot
    UnknownSensor,
    /// No active ticket matched the lookup
    NoMatchingTicket,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::NotAnExit => "not_an_exit",
            IgnoreReason::UnknownSensor => "unknown_sensor",
            IgnoreReason::NoMatchingTicket => "no_matching_ticket",
        }
    }
}

/// Raw event reported by an IoT proximity sensor
#[derive(Debug, Clone, Deserialize)]
pub struct SensorEvent {
    pub sensor_id: SensorId,
    /// Only "exit" events drive checkouts; everything else is a no-op
    pub action: String,
    /// License plate or spot number as seen by the sensor
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

impl SensorEvent {
    pub fn is_exit(&self) -> bool {
        self.action == "exit"
    }
}
