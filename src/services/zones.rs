//! In-memory registry of per-lot auto-checkout configuration

use crate::domain::ticket::ParkingId;
use crate::domain::zone::{SensorId, ZoneConfig};
use crate::io::stores::ZoneConfigStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{info, warn};

/// Which capability a caller is asking a zone for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneCapability {
    Geolocation,
    Sensor,
}

/// Owns the zone config map for the lifetime of a run.
///
/// Loading is fail-soft: a storage error leaves the map empty (or partial)
/// and auto-checkout is simply disabled for the affected lots. It is never
/// fatal to the engine.
#[derive(Default)]
pub struct ZoneRegistry {
    zones: RwLock<HashMap<ParkingId, ZoneConfig>>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from the external config store
    pub async fn load(&self, store: &dyn ZoneConfigStore) {
        match store.load_enabled_zones().await {
            Ok(configs) => {
                let mut zones = self.zones.write();
                zones.clear();
                for config in configs {
                    zones.insert(config.parking_id.clone(), config);
                }
                info!(zone_count = %zones.len(), "zones_loaded");
            }
            Err(e) => {
                warn!(error = %e, "zone_load_failed_auto_checkout_disabled");
            }
        }
    }

    /// Seed directly, bypassing the config store (tests)
    pub fn insert(&self, config: ZoneConfig) {
        self.zones.write().insert(config.parking_id.clone(), config);
    }

    pub fn get(&self, parking: &ParkingId) -> Option<ZoneConfig> {
        self.zones.read().get(parking).cloned()
    }

    /// Zone for a lot only if it supports the requested capability
    /// (geolocation matches geolocation|hybrid, sensor matches sensor|hybrid)
    pub fn find_by_capability(
        &self,
        parking: &ParkingId,
        capability: ZoneCapability,
    ) -> Option<ZoneConfig> {
        self.zones.read().get(parking).filter(|z| match capability {
            ZoneCapability::Geolocation => z.mode.accepts_geolocation(),
            ZoneCapability::Sensor => z.mode.accepts_sensor(),
        }).cloned()
    }

    /// The lot a sensor is bound to, if any, provided the lot accepts
    /// sensor-driven exits
    pub fn find_by_sensor(&self, sensor: &SensorId) -> Option<ZoneConfig> {
        self.zones
            .read()
            .values()
            .find(|z| z.mode.accepts_sensor() && z.has_sensor(sensor))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.zones.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::zone::{DetectionMode, GeoPoint};
    use crate::io::memory::StaticZoneStore;
    use async_trait::async_trait;

    fn zone(parking: &str, mode: DetectionMode) -> ZoneConfig {
        ZoneConfig::new(ParkingId(parking.into()), mode, GeoPoint { lat: 64.0, lng: -22.0 })
    }

    struct FailingZoneStore;

    #[async_trait]
    impl ZoneConfigStore for FailingZoneStore {
        async fn load_enabled_zones(&self) -> anyhow::Result<Vec<ZoneConfig>> {
            anyhow::bail!("config storage unavailable")
        }
    }

    #[tokio::test]
    async fn test_load_builds_map() {
        let registry = ZoneRegistry::new();
        let store = StaticZoneStore::new(vec![
            zone("p-1", DetectionMode::Geolocation),
            zone("p-2", DetectionMode::Sensor),
        ]);

        registry.load(&store).await;

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&ParkingId("p-1".into())).is_some());
        assert!(registry.get(&ParkingId("p-3".into())).is_none());
    }

    #[tokio::test]
    async fn test_load_fails_soft() {
        let registry = ZoneRegistry::new();
        registry.load(&FailingZoneStore).await;
        assert!(registry.is_empty());
    }

    #[test]
    fn test_find_by_capability_guards_mode() {
        let registry = ZoneRegistry::new();
        registry.insert(zone("geo", DetectionMode::Geolocation));
        registry.insert(zone("sensor", DetectionMode::Sensor));
        registry.insert(zone("hybrid", DetectionMode::Hybrid));

        let geo_lot = ParkingId("geo".into());
        let sensor_lot = ParkingId("sensor".into());
        let hybrid_lot = ParkingId("hybrid".into());

        assert!(registry.find_by_capability(&geo_lot, ZoneCapability::Geolocation).is_some());
        assert!(registry.find_by_capability(&geo_lot, ZoneCapability::Sensor).is_none());
        assert!(registry.find_by_capability(&sensor_lot, ZoneCapability::Sensor).is_some());
        assert!(registry.find_by_capability(&sensor_lot, ZoneCapability::Geolocation).is_none());
        assert!(registry.find_by_capability(&hybrid_lot, ZoneCapability::Geolocation).is_some());
        assert!(registry.find_by_capability(&hybrid_lot, ZoneCapability::Sensor).is_some());
    }

    #[test]
    fn test_find_by_sensor() {
        let registry = ZoneRegistry::new();
        registry.insert(zone("p-1", DetectionMode::Sensor).with_sensor(SensorId("S1".into())));
        // geolocation-only lot never matches sensors even if one is bound
        registry
            .insert(zone("p-2", DetectionMode::Geolocation).with_sensor(SensorId("S2".into())));

        let hit = registry.find_by_sensor(&SensorId("S1".into()));
        assert_eq!(hit.unwrap().parking_id, ParkingId("p-1".into()));

        assert!(registry.find_by_sensor(&SensorId("S2".into())).is_none());
        assert!(registry.find_by_sensor(&SensorId("S9".into())).is_none());
    }
}
