//! Engine facade wiring tracker, zones and coordinator
//!
//! This is the surface the API layer calls. It owns the component instances
//! (no module-level singletons) and the periodic maintenance task.

use crate::domain::checkout::{CheckoutId, CheckoutMeta, CheckoutOutcome, SensorEvent};
use crate::domain::error::EngineError;
use crate::domain::position::PositionSample;
use crate::domain::ticket::{TicketId, UserId};
use crate::infra::config::Config;
use crate::io::stores::{
    CheckoutRecord, CheckoutStore, Clock, NotificationSink, ParkingInventory, TicketStore,
    ZoneConfigStore,
};
use crate::services::coordinator::CheckoutCoordinator;
use crate::services::scheduler::Scheduler;
use crate::services::tracker::PositionTracker;
use crate::services::zones::ZoneRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::info;

/// External capabilities the engine consumes
pub struct Collaborators {
    pub tickets: Arc<dyn TicketStore>,
    pub checkouts: Arc<dyn CheckoutStore>,
    pub inventory: Arc<dyn ParkingInventory>,
    pub notifier: Arc<dyn NotificationSink>,
    pub scheduler: Arc<dyn Scheduler>,
    pub clock: Arc<dyn Clock>,
}

pub struct CheckoutEngine {
    tracker: Arc<PositionTracker>,
    zones: Arc<ZoneRegistry>,
    coordinator: Arc<CheckoutCoordinator>,
    clock: Arc<dyn Clock>,
    sweep_interval_secs: u64,
}

impl CheckoutEngine {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let zones = Arc::new(ZoneRegistry::new());

        let tracker = Arc::new(
            PositionTracker::new(
                collaborators.tickets.clone(),
                zones.clone(),
                collaborators.clock.clone(),
            )
            .with_limits(config.max_samples(), config.retention_ms()),
        );

        let coordinator = Arc::new(CheckoutCoordinator::new(
            collaborators.checkouts,
            collaborators.tickets,
            collaborators.inventory,
            collaborators.notifier,
            collaborators.scheduler,
            collaborators.clock.clone(),
            zones.clone(),
            config.rate_per_hour(),
        ));

        Self {
            tracker,
            zones,
            coordinator,
            clock: collaborators.clock,
            sweep_interval_secs: config.sweep_interval_secs(),
        }
    }

    /// Load zone configuration and spawn the periodic history sweep.
    /// Called once at startup.
    pub async fn start(&self, zone_store: &dyn ZoneConfigStore, shutdown: watch::Receiver<bool>) {
        self.zones.load(zone_store).await;
        self.spawn_maintenance(shutdown);
        info!(
            zone_count = %self.zones.len(),
            sweep_interval_secs = %self.sweep_interval_secs,
            "engine_started"
        );
    }

    fn spawn_maintenance(&self, mut shutdown: watch::Receiver<bool>) {
        let tracker = self.tracker.clone();
        let clock = self.clock.clone();
        let sweep_interval = Duration::from_secs(self.sweep_interval_secs);

        tokio::spawn(async move {
            let mut tick = interval(sweep_interval);
            // First tick fires immediately; skip it so a sweep never races
            // engine bring-up.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        tracker.sweep(clock.now_ms());
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Record a device position and run any checkouts it confirms.
    /// Raises only on validation; one outcome per confirmed exit.
    pub async fn track_position(
        &self,
        subject: &UserId,
        sample: PositionSample,
    ) -> Result<Vec<CheckoutOutcome>, EngineError> {
        let detections = self.tracker.record_position(subject, sample).await?;

        let mut outcomes = Vec::with_capacity(detections.len());
        for detection in detections {
            let meta = CheckoutMeta::Geolocation { exit_position: detection.exit_position };
            outcomes.push(
                self.coordinator
                    .initiate(&detection.ticket, meta, detection.confirmation_delay_secs)
                    .await,
            );
        }
        Ok(outcomes)
    }

    pub async fn ingest_sensor_event(&self, event: &SensorEvent) -> CheckoutOutcome {
        self.coordinator.process_sensor_event(event).await
    }

    pub async fn request_manual_checkout(
        &self,
        ticket_id: &TicketId,
        user: &UserId,
    ) -> CheckoutOutcome {
        self.coordinator.process_manual_checkout(ticket_id, user).await
    }

    pub async fn cancel_checkout(&self, id: &CheckoutId, reason: &str) -> bool {
        self.coordinator.cancel(id, reason).await
    }

    pub async fn checkout_history(&self, user: &UserId, limit: usize) -> Vec<CheckoutRecord> {
        self.coordinator.history(user, limit).await
    }

    /// One maintenance pass; the spawned task calls this on its interval
    pub fn run_maintenance(&self) {
        self.tracker.sweep(self.clock.now_ms());
    }

    pub fn zones(&self) -> &ZoneRegistry {
        &self.zones
    }

    pub fn tracked_subjects(&self) -> usize {
        self.tracker.subject_count()
    }
}
