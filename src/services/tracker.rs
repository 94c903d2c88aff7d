//! Per-subject position history and the geofence exit decision
//!
//! The tracker owns the only in-memory mutable map in the engine: recent
//! position samples per subject. Histories are bounded (50 samples, FIFO)
//! and swept on a maintenance tick (2 h retention). The lock is never held
//! across an await: evaluation runs on a cloned snapshot.

use crate::domain::error::EngineError;
use crate::domain::geo::distance_meters;
use crate::domain::position::PositionSample;
use crate::domain::ticket::{Ticket, UserId};
use crate::domain::zone::ZoneConfig;
use crate::io::stores::{Clock, TicketStore};
use crate::services::zones::{ZoneCapability, ZoneRegistry};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum samples retained per subject (oldest evicted first)
pub const MAX_SAMPLES: usize = 50;
/// Samples older than this are purged by the periodic sweep
pub const RETENTION_MS: u64 = 2 * 60 * 60 * 1000;

/// Size of the "currently outside" window (most recent samples)
const RECENT_WINDOW: usize = 3;
/// How far back the "was inside" window reaches from the end of history
const EARLIER_WINDOW_SPAN: usize = 5;

/// A confirmed geofence exit for one active ticket
#[derive(Debug, Clone)]
pub struct ExitDetection {
    pub ticket: Ticket,
    pub exit_position: PositionSample,
    pub confirmation_delay_secs: u32,
}

/// Tracks recent positions per subject and decides geofence exits
pub struct PositionTracker {
    /// Sample history per subject, most-recent-last
    histories: Mutex<HashMap<UserId, VecDeque<PositionSample>>>,
    tickets: Arc<dyn TicketStore>,
    zones: Arc<ZoneRegistry>,
    clock: Arc<dyn Clock>,
    max_samples: usize,
    retention_ms: u64,
}

impl PositionTracker {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        zones: Arc<ZoneRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            histories: Mutex::new(HashMap::new()),
            tickets,
            zones,
            clock,
            max_samples: MAX_SAMPLES,
            retention_ms: RETENTION_MS,
        }
    }

    pub fn with_limits(mut self, max_samples: usize, retention_ms: u64) -> Self {
        self.max_samples = max_samples;
        self.retention_ms = retention_ms;
        self
    }

    /// Record a validated sample and evaluate exits for the subject.
    ///
    /// Returns the confirmed exits; the caller decides what to do with them.
    /// Fails only on validation (empty subject, malformed sample). A ticket
    /// lookup failure is logged and yields no detections.
    pub async fn record_position(
        &self,
        subject: &UserId,
        sample: PositionSample,
    ) -> Result<SmallVec<[ExitDetection; 2]>, EngineError> {
        if subject.0.trim().is_empty() {
            return Err(EngineError::Validation("subject id must not be empty".into()));
        }
        sample.validate()?;

        let now = self.clock.now_ms();
        let stamped = if sample.timestamp_ms.is_some() {
            sample
        } else {
            sample.with_timestamp(now)
        };

        {
            let mut histories = self.histories.lock();
            let history = histories.entry(subject.clone()).or_default();
            if history.len() >= self.max_samples {
                history.pop_front();
            }
            history.push_back(stamped);
        }

        Ok(self.evaluate_exit(subject).await)
    }

    /// Evaluate the geofence exit decision for every active ticket of the
    /// subject whose lot accepts geolocation exits.
    pub async fn evaluate_exit(&self, subject: &UserId) -> SmallVec<[ExitDetection; 2]> {
        // Snapshot under the lock, evaluate without it
        let snapshot: Vec<PositionSample> = {
            let histories = self.histories.lock();
            match histories.get(subject) {
                Some(h) => h.iter().copied().collect(),
                None => return SmallVec::new(),
            }
        };

        let mut detections = SmallVec::new();
        if snapshot.len() < RECENT_WINDOW {
            return detections;
        }

        let tickets = match self.tickets.active_tickets_for_user(subject).await {
            Ok(tickets) => tickets,
            Err(e) => {
                warn!(subject = %subject, error = %e, "ticket_lookup_failed");
                return detections;
            }
        };

        for ticket in tickets {
            let Some(zone) =
                self.zones.find_by_capability(&ticket.parking_id, ZoneCapability::Geolocation)
            else {
                continue;
            };

            if confirmed_exit(&snapshot, &zone) {
                // Last sample is present: snapshot has >= 3 entries here
                let exit_position = snapshot[snapshot.len() - 1];
                info!(
                    subject = %subject,
                    ticket_id = %ticket.id,
                    parking_id = %ticket.parking_id,
                    radius_m = %zone.exit_radius_m,
                    "exit_confirmed"
                );
                detections.push(ExitDetection {
                    ticket,
                    exit_position,
                    confirmation_delay_secs: zone.confirmation_delay_secs,
                });
            }
        }

        detections
    }

    /// Purge samples older than the retention window and drop empty
    /// subjects. Maintenance path, not part of request handling.
    pub fn sweep(&self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.retention_ms);
        let mut purged = 0usize;
        let mut dropped_subjects = 0usize;

        let mut histories = self.histories.lock();
        histories.retain(|_, history| {
            let before = history.len();
            history.retain(|s| s.timestamp_or(now_ms) >= cutoff);
            purged += before - history.len();
            if history.is_empty() {
                dropped_subjects += 1;
                false
            } else {
                true
            }
        });

        if purged > 0 || dropped_subjects > 0 {
            debug!(
                purged_samples = %purged,
                dropped_subjects = %dropped_subjects,
                "history_swept"
            );
        }
    }

    pub fn sample_count(&self, subject: &UserId) -> usize {
        self.histories.lock().get(subject).map_or(0, |h| h.len())
    }

    pub fn subject_count(&self) -> usize {
        self.histories.lock().len()
    }
}

/// The two-window exit decision.
///
/// "Currently outside": all of the 3 most recent samples are farther than
/// the zone radius from the lot center. "Was inside": at least one of the
/// up-to-two samples immediately before that window was within the radius.
/// Exit is confirmed only when both hold, so a transient GPS jump or a
/// subject that was never observed inside the zone cannot trigger billing.
/// The window sizes are fixed; changing them changes observable billing
/// behavior.
pub fn confirmed_exit(history: &[PositionSample], zone: &ZoneConfig) -> bool {
    let len = history.len();
    if len < RECENT_WINDOW {
        return false;
    }

    let outside = |s: &PositionSample| {
        distance_meters(s.lat, s.lng, zone.center.lat, zone.center.lng) > zone.exit_radius_m
    };

    let recent = &history[len - RECENT_WINDOW..];
    if !recent.iter().all(outside) {
        return false;
    }

    let earlier = &history[len.saturating_sub(EARLIER_WINDOW_SPAN)..len - RECENT_WINDOW];
    earlier.iter().any(|s| !outside(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ticket::{ParkingId, TicketId, TicketStatus};
    use crate::domain::zone::{DetectionMode, GeoPoint, SensorId};
    use crate::io::memory::{InMemoryTicketStore, ManualClock};
    use chrono::{TimeZone, Utc};

    const CENTER: GeoPoint = GeoPoint { lat: 64.1466, lng: -21.9426 };
    /// Meters per degree of latitude, close enough for test offsets
    const M_PER_DEG_LAT: f64 = 111_320.0;

    fn sample_at_meters(meters_north: f64) -> PositionSample {
        PositionSample::new(CENTER.lat + meters_north / M_PER_DEG_LAT, CENTER.lng)
    }

    fn zone_100m(parking: &str) -> ZoneConfig {
        ZoneConfig::new(ParkingId(parking.into()), DetectionMode::Geolocation, CENTER)
    }

    fn active_ticket(id: &str, user: &str, parking: &str) -> Ticket {
        Ticket {
            id: TicketId(id.into()),
            user_id: UserId(user.into()),
            parking_id: ParkingId(parking.into()),
            status: TicketStatus::Active,
            plate: Some("ABC123".into()),
            spot: None,
            start_time: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            end_time: None,
            final_amount: None,
        }
    }

    fn build_tracker(
        tickets: Arc<InMemoryTicketStore>,
        zones: Arc<ZoneRegistry>,
        clock: Arc<ManualClock>,
    ) -> PositionTracker {
        PositionTracker::new(tickets, zones, clock)
    }

    #[test]
    fn test_exit_confirmed_inside_then_outside() {
        // One sample inside (30 m) followed by three outside
        let history = vec![
            sample_at_meters(30.0),
            sample_at_meters(150.0),
            sample_at_meters(160.0),
            sample_at_meters(170.0),
        ];
        assert!(confirmed_exit(&history, &zone_100m("p-1")));
    }

    #[test]
    fn test_exit_not_confirmed_never_inside() {
        // Only far-away samples: no observed inside->outside transition
        let history =
            vec![sample_at_meters(150.0), sample_at_meters(160.0), sample_at_meters(170.0)];
        assert!(!confirmed_exit(&history, &zone_100m("p-1")));

        let longer = vec![
            sample_at_meters(300.0),
            sample_at_meters(250.0),
            sample_at_meters(150.0),
            sample_at_meters(160.0),
            sample_at_meters(170.0),
        ];
        assert!(!confirmed_exit(&longer, &zone_100m("p-1")));
    }

    #[test]
    fn test_exit_not_confirmed_recent_sample_inside() {
        // A recent sample back inside the radius defeats "currently outside"
        let history = vec![
            sample_at_meters(30.0),
            sample_at_meters(150.0),
            sample_at_meters(50.0),
            sample_at_meters(170.0),
        ];
        assert!(!confirmed_exit(&history, &zone_100m("p-1")));
    }

    #[test]
    fn test_exit_requires_three_samples() {
        let history = vec![sample_at_meters(150.0), sample_at_meters(160.0)];
        assert!(!confirmed_exit(&history, &zone_100m("p-1")));
    }

    #[test]
    fn test_earlier_window_reaches_two_samples_back() {
        // inside sample sits exactly at the -5 position
        let history = vec![
            sample_at_meters(40.0),
            sample_at_meters(120.0),
            sample_at_meters(150.0),
            sample_at_meters(160.0),
            sample_at_meters(170.0),
        ];
        assert!(confirmed_exit(&history, &zone_100m("p-1")));

        // inside sample older than the earlier window is not considered
        let history = vec![
            sample_at_meters(40.0),
            sample_at_meters(110.0),
            sample_at_meters(120.0),
            sample_at_meters(150.0),
            sample_at_meters(160.0),
            sample_at_meters(170.0),
        ];
        assert!(!confirmed_exit(&history, &zone_100m("p-1")));
    }

    #[test]
    fn test_boundary_is_exclusive_outside() {
        // Samples exactly at the radius are not "outside" (must be farther)
        let history = vec![
            sample_at_meters(30.0),
            sample_at_meters(100.0),
            sample_at_meters(100.0),
            sample_at_meters(100.0),
        ];
        assert!(!confirmed_exit(&history, &zone_100m("p-1")));
    }

    #[tokio::test]
    async fn test_record_rejects_bad_input() {
        let tickets = Arc::new(InMemoryTicketStore::new());
        let zones = Arc::new(ZoneRegistry::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let tracker = build_tracker(tickets, zones, clock);

        let err = tracker
            .record_position(&UserId("".into()), PositionSample::new(64.0, -22.0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = tracker
            .record_position(&UserId("u-1".into()), PositionSample::new(95.0, -22.0))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        assert_eq!(tracker.sample_count(&UserId("u-1".into())), 0);
    }

    #[tokio::test]
    async fn test_history_capped_fifo() {
        let tickets = Arc::new(InMemoryTicketStore::new());
        let zones = Arc::new(ZoneRegistry::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let tracker = build_tracker(tickets, zones, clock);
        let subject = UserId("u-1".into());

        for i in 0..60 {
            tracker
                .record_position(&subject, sample_at_meters(10.0).with_timestamp(i))
                .await
                .unwrap();
        }

        assert_eq!(tracker.sample_count(&subject), MAX_SAMPLES);

        // Oldest were evicted: remaining timestamps are 10..=59
        let snapshot: Vec<PositionSample> = {
            let histories = tracker.histories.lock();
            histories.get(&subject).unwrap().iter().copied().collect()
        };
        assert_eq!(snapshot.first().unwrap().timestamp_ms, Some(10));
        assert_eq!(snapshot.last().unwrap().timestamp_ms, Some(59));
    }

    #[tokio::test]
    async fn test_record_detects_exit_for_active_ticket() {
        let tickets = Arc::new(InMemoryTicketStore::new());
        let zones = Arc::new(ZoneRegistry::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        tickets.insert(active_ticket("t-1", "u-1", "p-1"));
        zones.insert(zone_100m("p-1").with_delay(15));

        let tracker = build_tracker(tickets, zones, clock);
        let subject = UserId("u-1".into());

        for m in [30.0, 150.0, 160.0] {
            let detections =
                tracker.record_position(&subject, sample_at_meters(m)).await.unwrap();
            assert!(detections.is_empty());
        }

        let detections =
            tracker.record_position(&subject, sample_at_meters(170.0)).await.unwrap();
        assert_eq!(detections.len(), 1);
        let detection = &detections[0];
        assert_eq!(detection.ticket.id, TicketId("t-1".into()));
        assert_eq!(detection.confirmation_delay_secs, 15);
        // Exit position is the most recent sample
        assert!((detection.exit_position.lat - sample_at_meters(170.0).lat).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_no_detection_for_sensor_only_zone() {
        let tickets = Arc::new(InMemoryTicketStore::new());
        let zones = Arc::new(ZoneRegistry::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        tickets.insert(active_ticket("t-1", "u-1", "p-1"));
        zones.insert(
            ZoneConfig::new(ParkingId("p-1".into()), DetectionMode::Sensor, CENTER)
                .with_sensor(SensorId("S1".into())),
        );

        let tracker = build_tracker(tickets, zones, clock);
        let subject = UserId("u-1".into());

        for m in [30.0, 150.0, 160.0, 170.0] {
            let detections =
                tracker.record_position(&subject, sample_at_meters(m)).await.unwrap();
            assert!(detections.is_empty());
        }
    }

    #[tokio::test]
    async fn test_sweep_purges_and_drops_empty_subjects() {
        let tickets = Arc::new(InMemoryTicketStore::new());
        let zones = Arc::new(ZoneRegistry::new());
        let now = 1_700_000_000_000u64;
        let clock = Arc::new(ManualClock::new(now));
        let tracker = build_tracker(tickets, zones, clock);

        let stale = UserId("stale".into());
        let fresh = UserId("fresh".into());

        tracker
            .record_position(&stale, sample_at_meters(10.0).with_timestamp(now - RETENTION_MS - 1))
            .await
            .unwrap();
        tracker
            .record_position(&fresh, sample_at_meters(10.0).with_timestamp(now - 1_000))
            .await
            .unwrap();

        tracker.sweep(now);

        assert_eq!(tracker.subject_count(), 1);
        assert_eq!(tracker.sample_count(&stale), 0);
        assert_eq!(tracker.sample_count(&fresh), 1);
    }
}
