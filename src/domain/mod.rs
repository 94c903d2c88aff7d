//! Domain models - core business types for the checkout engine
//!
//! This module contains the canonical data types used throughout the system:
//! - `Checkout` - the state-machine subject driven to one terminal outcome
//! - `Ticket` - mirror of the external parking session entity
//! - `ZoneConfig` - per-lot auto-checkout configuration
//! - `PositionSample` - validated device position reports
//! - `geo` - great-circle distance math

pub mod checkout;
pub mod error;
pub mod geo;
pub mod position;
pub mod ticket;
pub mod zone;

// Re-export commonly used types at module level
pub use checkout::{
    Checkout, CheckoutId, CheckoutMeta, CheckoutMethod, CheckoutOutcome, CheckoutStatus,
    IgnoreReason, SensorEvent,
};
pub use error::EngineError;
pub use position::PositionSample;
pub use ticket::{ParkingId, Ticket, TicketId, TicketStatus, UserId};
pub use zone::{DetectionMode, GeoPoint, SensorId, ZoneConfig};
