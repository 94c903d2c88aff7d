//! Collaborator trait boundaries
//!
//! The engine consumes these capabilities but does not own their mechanics:
//! ticket rows, checkout rows, lot inventory, notification delivery and the
//! zone configuration store all live in the surrounding system. Everything
//! here is an async trait so real implementations can hit a database or a
//! message bus; tests and the sim binary use the in-memory versions in
//! [`crate::io::memory`].

use crate::domain::checkout::{Checkout, CheckoutId};
use crate::domain::position::epoch_ms;
use crate::domain::ticket::{ParkingId, Ticket, TicketId, UserId};
use crate::domain::zone::ZoneConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Parking lot summary used for notifications and history display
#[derive(Debug, Clone)]
pub struct Lot {
    pub id: ParkingId,
    pub name: String,
}

/// A checkout joined with display information for history listings
#[derive(Debug, Clone)]
pub struct CheckoutRecord {
    pub checkout: Checkout,
    pub parking_name: String,
    pub spot: Option<String>,
}

/// Lookup and mutation of active parking tickets
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// All active tickets belonging to a subject, any lot
    async fn active_tickets_for_user(&self, user: &UserId) -> anyhow::Result<Vec<Ticket>>;

    /// An active ticket by id, or absent
    async fn find_active(&self, id: &TicketId) -> anyhow::Result<Option<Ticket>>;

    /// Most recently started active ticket at a lot whose plate or spot
    /// matches `vehicle_ref` (start_time DESC, first row wins)
    async fn latest_active_at_lot(
        &self,
        parking: &ParkingId,
        vehicle_ref: &str,
    ) -> anyhow::Result<Option<Ticket>>;

    /// Transition a ticket to completed with its final charge
    async fn complete(
        &self,
        id: &TicketId,
        end_time: DateTime<Utc>,
        final_amount: f64,
    ) -> anyhow::Result<()>;
}

/// Persistence for checkout rows.
///
/// The status-transition methods are guarded compare-and-set operations:
/// they apply only while the row is still `Pending` and report whether a row
/// was affected. That affected-rows contract is the engine's race-safety
/// mechanism, substituting for row-level locking.
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    async fn insert(&self, checkout: &Checkout) -> anyhow::Result<()>;

    async fn get(&self, id: &CheckoutId) -> anyhow::Result<Option<Checkout>>;

    /// Pending -> Completed; returns false (0 rows) if no longer pending
    async fn complete(
        &self,
        id: &CheckoutId,
        completed_at: u64,
        final_amount: f64,
    ) -> anyhow::Result<bool>;

    /// Pending -> Failed with the captured error; false if no longer pending
    async fn fail(&self, id: &CheckoutId, error_message: &str) -> anyhow::Result<bool>;

    /// Pending -> Cancelled; false if no longer pending
    async fn cancel(
        &self,
        id: &CheckoutId,
        cancelled_at: u64,
        reason: &str,
    ) -> anyhow::Result<bool>;

    /// Newest-first checkouts for a user, joined with lot display info
    async fn history_for_user(
        &self,
        user: &UserId,
        limit: usize,
    ) -> anyhow::Result<Vec<CheckoutRecord>>;
}

/// Available-spot accounting and lot lookup
#[async_trait]
pub trait ParkingInventory: Send + Sync {
    async fn increment_available(&self, parking: &ParkingId) -> anyhow::Result<()>;

    async fn find_lot(&self, parking: &ParkingId) -> anyhow::Result<Option<Lot>>;
}

/// Delivery of user-facing notifications (transport is out of scope)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(
        &self,
        user: &UserId,
        title: &str,
        message: &str,
        related_id: &str,
    ) -> anyhow::Result<()>;
}

/// Source of zone configurations for lots with auto-checkout enabled
#[async_trait]
pub trait ZoneConfigStore: Send + Sync {
    async fn load_enabled_zones(&self) -> anyhow::Result<Vec<ZoneConfig>>;
}

/// Injectable wall clock so confirmation timing and billing are
/// deterministic under test
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Production clock backed by `SystemTime`
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        epoch_ms()
    }
}
