//! External ticket entity, consumed not owned
//!
//! The engine only ever transitions `Active` tickets; any other status on
//! lookup acts as an idempotency guard rather than an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Newtype wrapper for ticket IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TicketId(pub String);

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for user/subject IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for parking lot IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ParkingId(pub String);

impl std::fmt::Display for ParkingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Completed,
    Cancelled,
    Expired,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "active",
            TicketStatus::Completed => "completed",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::Expired => "expired",
        }
    }
}

/// Mirror of the parking ticket row owned by the surrounding system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub user_id: UserId,
    pub parking_id: ParkingId,
    pub status: TicketStatus,
    /// License plate, when registered
    pub plate: Option<String>,
    /// Spot number, when assigned
    pub spot: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Final charge, set exactly once when the ticket is completed
    pub final_amount: Option<f64>,
}

impl Ticket {
    pub fn is_active(&self) -> bool {
        self.status == TicketStatus::Active
    }

    /// True when the sensor-reported vehicle reference matches this ticket
    /// by either license plate or spot number.
    pub fn matches_vehicle(&self, vehicle_ref: &str) -> bool {
        self.plate.as_deref() == Some(vehicle_ref) || self.spot.as_deref() == Some(vehicle_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ticket() -> Ticket {
        Ticket {
            id: TicketId("t-1".into()),
            user_id: UserId("u-1".into()),
            parking_id: ParkingId("p-1".into()),
            status: TicketStatus::Active,
            plate: Some("ABC123".into()),
            spot: Some("14".into()),
            start_time: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            end_time: None,
            final_amount: None,
        }
    }

    #[test]
    fn test_matches_vehicle_by_plate_or_spot() {
        let t = ticket();
        assert!(t.matches_vehicle("ABC123"));
        assert!(t.matches_vehicle("14"));
        assert!(!t.matches_vehicle("XYZ999"));
    }

    #[test]
    fn test_is_active() {
        let mut t = ticket();
        assert!(t.is_active());
        t.status = TicketStatus::Completed;
        assert!(!t.is_active());
    }
}
