//! In-memory collaborator implementations
//!
//! Used as the test substrate and by the sim binary. Each store keeps its
//! rows in a `parking_lot`-guarded map and implements the same guarded
//! status-transition contract a relational backend would via
//! `UPDATE .. WHERE status = 'pending'`.

use crate::domain::checkout::{Checkout, CheckoutId, CheckoutStatus};
use crate::domain::ticket::{ParkingId, Ticket, TicketId, TicketStatus, UserId};
use crate::domain::zone::ZoneConfig;
use crate::io::stores::{
    CheckoutRecord, CheckoutStore, Clock, Lot, NotificationSink, ParkingInventory, TicketStore,
    ZoneConfigStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ticket rows keyed by id
#[derive(Default)]
pub struct InMemoryTicketStore {
    tickets: Mutex<HashMap<TicketId, Ticket>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ticket: Ticket) {
        self.tickets.lock().insert(ticket.id.clone(), ticket);
    }

    pub fn get(&self, id: &TicketId) -> Option<Ticket> {
        self.tickets.lock().get(id).cloned()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn active_tickets_for_user(&self, user: &UserId) -> anyhow::Result<Vec<Ticket>> {
        let tickets = self.tickets.lock();
        let mut found: Vec<Ticket> =
            tickets.values().filter(|t| t.is_active() && &t.user_id == user).cloned().collect();
        found.sort_by_key(|t| t.start_time);
        Ok(found)
    }

    async fn find_active(&self, id: &TicketId) -> anyhow::Result<Option<Ticket>> {
        Ok(self.tickets.lock().get(id).filter(|t| t.is_active()).cloned())
    }

    async fn latest_active_at_lot(
        &self,
        parking: &ParkingId,
        vehicle_ref: &str,
    ) -> anyhow::Result<Option<Ticket>> {
        let tickets = self.tickets.lock();
        // start_time DESC, first row wins
        Ok(tickets
            .values()
            .filter(|t| {
                t.is_active() && &t.parking_id == parking && t.matches_vehicle(vehicle_ref)
            })
            .max_by_key(|t| t.start_time)
            .cloned())
    }

    async fn complete(
        &self,
        id: &TicketId,
        end_time: DateTime<Utc>,
        final_amount: f64,
    ) -> anyhow::Result<()> {
        let mut tickets = self.tickets.lock();
        let ticket = tickets
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("ticket {id} not found"))?;
        ticket.status = TicketStatus::Completed;
        ticket.end_time = Some(end_time);
        ticket.final_amount = Some(final_amount);
        Ok(())
    }
}

/// Checkout rows keyed by id. History rows are joined with registered lot
/// display names and, when a ticket source is attached, the ticket's spot
/// (the in-memory analog of a relational join).
#[derive(Default)]
pub struct InMemoryCheckoutStore {
    checkouts: Mutex<HashMap<CheckoutId, Checkout>>,
    lot_names: Mutex<HashMap<ParkingId, String>>,
    tickets: Option<Arc<InMemoryTicketStore>>,
}

impl InMemoryCheckoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tickets(tickets: Arc<InMemoryTicketStore>) -> Self {
        Self { tickets: Some(tickets), ..Self::default() }
    }

    pub fn register_lot_name(&self, parking: ParkingId, name: &str) {
        self.lot_names.lock().insert(parking, name.to_string());
    }

    pub fn get_sync(&self, id: &CheckoutId) -> Option<Checkout> {
        self.checkouts.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.checkouts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkouts.lock().is_empty()
    }
}

#[async_trait]
impl CheckoutStore for InMemoryCheckoutStore {
    async fn insert(&self, checkout: &Checkout) -> anyhow::Result<()> {
        self.checkouts.lock().insert(checkout.id.clone(), checkout.clone());
        Ok(())
    }

    async fn get(&self, id: &CheckoutId) -> anyhow::Result<Option<Checkout>> {
        Ok(self.checkouts.lock().get(id).cloned())
    }

    async fn complete(
        &self,
        id: &CheckoutId,
        completed_at: u64,
        final_amount: f64,
    ) -> anyhow::Result<bool> {
        let mut checkouts = self.checkouts.lock();
        match checkouts.get_mut(id) {
            Some(c) if c.status == CheckoutStatus::Pending => {
                c.status = CheckoutStatus::Completed;
                c.completed_at = Some(completed_at);
                c.final_amount = Some(final_amount);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail(&self, id: &CheckoutId, error_message: &str) -> anyhow::Result<bool> {
        let mut checkouts = self.checkouts.lock();
        match checkouts.get_mut(id) {
            Some(c) if c.status == CheckoutStatus::Pending => {
                c.status = CheckoutStatus::Failed;
                c.error_message = Some(error_message.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel(
        &self,
        id: &CheckoutId,
        cancelled_at: u64,
        reason: &str,
    ) -> anyhow::Result<bool> {
        let mut checkouts = self.checkouts.lock();
        match checkouts.get_mut(id) {
            Some(c) if c.status == CheckoutStatus::Pending => {
                c.status = CheckoutStatus::Cancelled;
                c.cancelled_at = Some(cancelled_at);
                c.cancel_reason = Some(reason.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn history_for_user(
        &self,
        user: &UserId,
        limit: usize,
    ) -> anyhow::Result<Vec<CheckoutRecord>> {
        let checkouts = self.checkouts.lock();
        let lot_names = self.lot_names.lock();

        let mut rows: Vec<&Checkout> =
            checkouts.values().filter(|c| &c.user_id == user).collect();
        rows.sort_by(|a, b| b.initiated_at.cmp(&a.initiated_at));

        Ok(rows
            .into_iter()
            .take(limit)
            .map(|c| CheckoutRecord {
                checkout: c.clone(),
                parking_name: lot_names
                    .get(&c.parking_id)
                    .cloned()
                    .unwrap_or_else(|| c.parking_id.0.clone()),
                spot: self
                    .tickets
                    .as_ref()
                    .and_then(|store| store.get(&c.ticket_id))
                    .and_then(|t| t.spot),
            })
            .collect())
    }
}

/// Lot registry with available-spot counters
#[derive(Default)]
pub struct InMemoryInventory {
    lots: Mutex<HashMap<ParkingId, (String, u32)>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_lot(&self, parking: ParkingId, name: &str, available: u32) {
        self.lots.lock().insert(parking, (name.to_string(), available));
    }

    pub fn available(&self, parking: &ParkingId) -> Option<u32> {
        self.lots.lock().get(parking).map(|(_, n)| *n)
    }
}

#[async_trait]
impl ParkingInventory for InMemoryInventory {
    async fn increment_available(&self, parking: &ParkingId) -> anyhow::Result<()> {
        let mut lots = self.lots.lock();
        let (_, available) = lots
            .get_mut(parking)
            .ok_or_else(|| anyhow::anyhow!("lot {parking} not found"))?;
        *available += 1;
        Ok(())
    }

    async fn find_lot(&self, parking: &ParkingId) -> anyhow::Result<Option<Lot>> {
        Ok(self
            .lots
            .lock()
            .get(parking)
            .map(|(name, _)| Lot { id: parking.clone(), name: name.clone() }))
    }
}

/// A sent notification, captured for assertions
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub user: UserId,
    pub title: String,
    pub message: String,
    pub related_id: String,
}

/// Notification sink that records everything it is asked to deliver
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send(
        &self,
        user: &UserId,
        title: &str,
        message: &str,
        related_id: &str,
    ) -> anyhow::Result<()> {
        self.sent.lock().push(SentNotification {
            user: user.clone(),
            title: title.to_string(),
            message: message.to_string(),
            related_id: related_id.to_string(),
        });
        Ok(())
    }
}

/// Fixed set of zone configs handed out on load
pub struct StaticZoneStore {
    zones: Vec<ZoneConfig>,
}

impl StaticZoneStore {
    pub fn new(zones: Vec<ZoneConfig>) -> Self {
        Self { zones }
    }
}

#[async_trait]
impl ZoneConfigStore for StaticZoneStore {
    async fn load_enabled_zones(&self) -> anyhow::Result<Vec<ZoneConfig>> {
        Ok(self.zones.clone())
    }
}

/// Manually advanced clock for deterministic tests
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self { now_ms: AtomicU64::new(now_ms) }
    }

    pub fn advance_ms(&self, delta: u64) {
        self.now_ms.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set_ms(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::checkout::CheckoutMeta;
    use chrono::TimeZone;

    fn ticket(id: &str, user: &str, parking: &str, plate: &str, start_ms: i64) -> Ticket {
        Ticket {
            id: TicketId(id.into()),
            user_id: UserId(user.into()),
            parking_id: ParkingId(parking.into()),
            status: TicketStatus::Active,
            plate: Some(plate.into()),
            spot: None,
            start_time: Utc.timestamp_millis_opt(start_ms).unwrap(),
            end_time: None,
            final_amount: None,
        }
    }

    #[tokio::test]
    async fn test_latest_active_at_lot_prefers_most_recent() {
        let store = InMemoryTicketStore::new();
        store.insert(ticket("t-1", "u-1", "p-1", "ABC123", 1_000));
        store.insert(ticket("t-2", "u-2", "p-1", "ABC123", 2_000));

        let found =
            store.latest_active_at_lot(&ParkingId("p-1".into()), "ABC123").await.unwrap();
        assert_eq!(found.unwrap().id, TicketId("t-2".into()));
    }

    #[tokio::test]
    async fn test_guarded_transitions_affect_pending_only() {
        let store = InMemoryCheckoutStore::new();
        let checkout = Checkout::pending(
            TicketId("t-1".into()),
            UserId("u-1".into()),
            ParkingId("p-1".into()),
            CheckoutMeta::Manual { requested_by: UserId("u-1".into()) },
            1_000,
        );
        let id = checkout.id.clone();
        store.insert(&checkout).await.unwrap();

        assert!(store.complete(&id, 2_000, 4.20).await.unwrap());
        // Second transition attempts hit a terminal row: 0 rows affected
        assert!(!store.complete(&id, 3_000, 9.99).await.unwrap());
        assert!(!store.cancel(&id, 3_000, "late").await.unwrap());
        assert!(!store.fail(&id, "boom").await.unwrap());

        let row = store.get_sync(&id).unwrap();
        assert_eq!(row.status, CheckoutStatus::Completed);
        assert_eq!(row.final_amount, Some(4.20));
    }

    #[tokio::test]
    async fn test_ticket_complete_records_final_amount() {
        let store = InMemoryTicketStore::new();
        store.insert(ticket("t-1", "u-1", "p-1", "ABC123", 1_000));

        let end = Utc.timestamp_millis_opt(2_000).unwrap();
        store.complete(&TicketId("t-1".into()), end, 3.5).await.unwrap();

        let completed = store.get(&TicketId("t-1".into())).unwrap();
        assert_eq!(completed.status, TicketStatus::Completed);
        assert_eq!(completed.end_time, Some(end));
        assert_eq!(completed.final_amount, Some(3.5));
    }

    #[tokio::test]
    async fn test_inventory_increment() {
        let inv = InMemoryInventory::new();
        inv.add_lot(ParkingId("p-1".into()), "Harbor Lot", 3);
        inv.increment_available(&ParkingId("p-1".into())).await.unwrap();
        assert_eq!(inv.available(&ParkingId("p-1".into())), Some(4));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        clock.advance_ms(50);
        assert_eq!(clock.now_ms(), 150);
        clock.set_ms(10);
        assert_eq!(clock.now_ms(), 10);
    }
}
