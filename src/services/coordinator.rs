//! Checkout state machine: initiate, confirm, cancel
//!
//! A checkout is opened `Pending` by one of three entry points (geolocation
//! exit, sensor exit, manual request), then finalized by `confirm` after the
//! zone's confirmation delay. Every status mutation goes through the store's
//! guarded pending-only transitions, which makes `confirm` idempotent with
//! itself and with `cancel` without any timer cancellation.

use crate::domain::checkout::{
    Checkout, CheckoutId, CheckoutMeta, CheckoutOutcome, CheckoutStatus, IgnoreReason,
    SensorEvent,
};
use crate::domain::ticket::{Ticket, TicketId, UserId};
use crate::io::stores::{
    CheckoutRecord, CheckoutStore, Clock, NotificationSink, ParkingInventory, TicketStore,
};
use crate::services::scheduler::Scheduler;
use crate::services::zones::ZoneRegistry;
use anyhow::Context;
use chrono::DateTime;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Compute the final charge: hours at the configured rate, rounded UP to the
/// nearest currency minor unit. Billing never rounds down; a 61-minute stay
/// is charged as ceil(61/60 * rate * 100) / 100.
pub fn final_amount(duration_min: f64, rate_per_hour: f64) -> f64 {
    (duration_min / 60.0 * rate_per_hour * 100.0).ceil() / 100.0
}

/// Cheap to clone; every field is shared. A clone is moved into each
/// scheduled confirmation task.
#[derive(Clone)]
pub struct CheckoutCoordinator {
    checkouts: Arc<dyn CheckoutStore>,
    tickets: Arc<dyn TicketStore>,
    inventory: Arc<dyn ParkingInventory>,
    notifier: Arc<dyn NotificationSink>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    zones: Arc<ZoneRegistry>,
    rate_per_hour: f64,
}

impl CheckoutCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        checkouts: Arc<dyn CheckoutStore>,
        tickets: Arc<dyn TicketStore>,
        inventory: Arc<dyn ParkingInventory>,
        notifier: Arc<dyn NotificationSink>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        zones: Arc<ZoneRegistry>,
        rate_per_hour: f64,
    ) -> Self {
        Self { checkouts, tickets, inventory, notifier, scheduler, clock, zones, rate_per_hour }
    }

    /// Open a pending checkout and schedule its confirmation.
    ///
    /// Never raises: a persistence failure is logged, the initiation is
    /// abandoned and the ticket stays active so the user can retry.
    pub async fn initiate(
        &self,
        ticket: &Ticket,
        meta: CheckoutMeta,
        delay_secs: u32,
    ) -> CheckoutOutcome {
        let now = self.clock.now_ms();
        let checkout = Checkout::pending(
            ticket.id.clone(),
            ticket.user_id.clone(),
            ticket.parking_id.clone(),
            meta,
            now,
        );
        let id = checkout.id.clone();

        if let Err(e) = self.checkouts.insert(&checkout).await {
            warn!(
                ticket_id = %ticket.id,
                method = %checkout.method.as_str(),
                error = %e,
                "checkout_initiation_abandoned"
            );
            return CheckoutOutcome::Failed(e.to_string());
        }

        info!(
            checkout_id = %id,
            ticket_id = %ticket.id,
            parking_id = %ticket.parking_id,
            method = %checkout.method.as_str(),
            delay_secs = %delay_secs,
            "checkout_initiated"
        );

        if delay_secs == 0 {
            self.confirm(&id).await;
        } else {
            let coordinator = self.clone();
            let scheduled_id = id.clone();
            self.scheduler.after(
                Duration::from_secs(u64::from(delay_secs)),
                Box::pin(async move {
                    coordinator.confirm(&scheduled_id).await;
                }),
            );
        }

        CheckoutOutcome::Initiated(id)
    }

    /// Sensor ingestion path. Noise (non-exit actions, unknown sensors,
    /// no matching ticket) is an explicit no-op, never an error.
    pub async fn process_sensor_event(&self, event: &SensorEvent) -> CheckoutOutcome {
        if !event.is_exit() {
            debug!(sensor_id = %event.sensor_id, action = %event.action, "sensor_event_ignored");
            return CheckoutOutcome::Ignored(IgnoreReason::NotAnExit);
        }

        let Some(zone) = self.zones.find_by_sensor(&event.sensor_id) else {
            debug!(sensor_id = %event.sensor_id, "sensor_not_bound_to_lot");
            return CheckoutOutcome::Ignored(IgnoreReason::UnknownSensor);
        };

        let Some(vehicle_ref) = event.vehicle_id.as_deref() else {
            debug!(sensor_id = %event.sensor_id, "sensor_event_without_vehicle");
            return CheckoutOutcome::Ignored(IgnoreReason::NoMatchingTicket);
        };

        let ticket = match self.tickets.latest_active_at_lot(&zone.parking_id, vehicle_ref).await
        {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                debug!(
                    sensor_id = %event.sensor_id,
                    parking_id = %zone.parking_id,
                    vehicle = %vehicle_ref,
                    "sensor_exit_no_matching_ticket"
                );
                return CheckoutOutcome::Ignored(IgnoreReason::NoMatchingTicket);
            }
            Err(e) => {
                warn!(sensor_id = %event.sensor_id, error = %e, "sensor_ticket_lookup_failed");
                return CheckoutOutcome::Failed(e.to_string());
            }
        };

        let meta = CheckoutMeta::Sensor {
            sensor_id: event.sensor_id.clone(),
            vehicle_ref: vehicle_ref.to_string(),
        };
        self.initiate(&ticket, meta, zone.confirmation_delay_secs).await
    }

    /// Manual "leave now" path. Absent or foreign tickets are a silent
    /// no-op so a double tap never errors. Runs with no confirmation delay.
    pub async fn process_manual_checkout(
        &self,
        ticket_id: &TicketId,
        user: &UserId,
    ) -> CheckoutOutcome {
        let ticket = match self.tickets.find_active(ticket_id).await {
            Ok(Some(ticket)) if &ticket.user_id == user => ticket,
            Ok(_) => {
                debug!(ticket_id = %ticket_id, user = %user, "manual_checkout_no_active_ticket");
                return CheckoutOutcome::Ignored(IgnoreReason::NoMatchingTicket);
            }
            Err(e) => {
                warn!(ticket_id = %ticket_id, error = %e, "manual_ticket_lookup_failed");
                return CheckoutOutcome::Failed(e.to_string());
            }
        };

        let meta = CheckoutMeta::Manual { requested_by: user.clone() };
        self.initiate(&ticket, meta, 0).await
    }

    /// Finalize a pending checkout: re-validate the ticket, compute the
    /// charge, complete ticket and checkout, free the spot, notify the user.
    ///
    /// Idempotent by construction: a missing or non-pending checkout is a
    /// no-op, so double-fires and races with `cancel` are harmless. Any
    /// failure during finalization marks the checkout failed and leaves the
    /// ticket as-is, keeping manual checkout as a fallback.
    pub async fn confirm(&self, id: &CheckoutId) {
        let checkout = match self.checkouts.get(id).await {
            Ok(Some(checkout)) => checkout,
            Ok(None) => {
                debug!(checkout_id = %id, "confirm_skipped_missing");
                return;
            }
            Err(e) => {
                warn!(checkout_id = %id, error = %e, "confirm_fetch_failed");
                return;
            }
        };

        if checkout.status != CheckoutStatus::Pending {
            debug!(
                checkout_id = %id,
                status = %checkout.status.as_str(),
                "confirm_skipped_not_pending"
            );
            return;
        }

        match self.finalize(&checkout).await {
            Ok(amount) => {
                info!(
                    checkout_id = %id,
                    ticket_id = %checkout.ticket_id,
                    final_amount = %amount,
                    "checkout_completed"
                );
            }
            Err(e) => {
                warn!(checkout_id = %id, error = %e, "checkout_failed");
                // Guarded: if the checkout raced to a terminal state in the
                // meantime it stays there (0 rows affected).
                match self.checkouts.fail(id, &e.to_string()).await {
                    Ok(_) => {}
                    Err(store_err) => {
                        warn!(checkout_id = %id, error = %store_err, "checkout_fail_mark_failed");
                    }
                }
            }
        }
    }

    async fn finalize(&self, checkout: &Checkout) -> anyhow::Result<f64> {
        let ticket = self
            .tickets
            .find_active(&checkout.ticket_id)
            .await
            .context("ticket lookup")?
            .ok_or_else(|| {
                anyhow::anyhow!("ticket {} is no longer active", checkout.ticket_id)
            })?;

        let now = self.clock.now_ms();
        let start_ms = ticket.start_time.timestamp_millis().max(0) as u64;
        let duration_min = now.saturating_sub(start_ms) as f64 / 60_000.0;
        let amount = final_amount(duration_min, self.rate_per_hour);

        let end_time = DateTime::from_timestamp_millis(now as i64)
            .ok_or_else(|| anyhow::anyhow!("end time out of range: {now}"))?;

        self.tickets.complete(&ticket.id, end_time, amount).await.context("ticket complete")?;
        self.inventory
            .increment_available(&ticket.parking_id)
            .await
            .context("inventory increment")?;

        let updated = self
            .checkouts
            .complete(&checkout.id, now, amount)
            .await
            .context("checkout complete")?;
        if !updated {
            // Lost a race against cancel after the ticket mutation; the
            // terminal state wins and no second completion is recorded.
            debug!(checkout_id = %checkout.id, "checkout_completed_race_lost");
            return Ok(amount);
        }

        let lot_name = self
            .inventory
            .find_lot(&ticket.parking_id)
            .await
            .unwrap_or(None)
            .map(|lot| lot.name)
            .unwrap_or_else(|| ticket.parking_id.0.clone());

        let minutes = duration_min.round() as u64;
        let message = format!(
            "You have been checked out of {lot_name} after {minutes} min. Final amount: {amount:.2}"
        );
        self.notifier
            .send(&ticket.user_id, "Parking checkout complete", &message, &checkout.id.0)
            .await
            .context("notification send")?;

        Ok(amount)
    }

    /// User/operator abort. Only a pending checkout can be cancelled;
    /// anything else is a silent no-op (0 rows), keeping the operation
    /// idempotent under races with `confirm`.
    pub async fn cancel(&self, id: &CheckoutId, reason: &str) -> bool {
        let now = self.clock.now_ms();
        match self.checkouts.cancel(id, now, reason).await {
            Ok(true) => {
                info!(checkout_id = %id, reason = %reason, "checkout_cancelled");
                true
            }
            Ok(false) => {
                debug!(checkout_id = %id, "cancel_skipped_not_pending");
                false
            }
            Err(e) => {
                warn!(checkout_id = %id, error = %e, "cancel_failed");
                false
            }
        }
    }

    /// Read-only history, newest first. Empty on any read failure rather
    /// than propagating.
    pub async fn history(&self, user: &UserId, limit: usize) -> Vec<CheckoutRecord> {
        match self.checkouts.history_for_user(user, limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!(user = %user, error = %e, "history_read_failed");
                Vec::new()
            }
        }
    }
}
