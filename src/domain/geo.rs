//! Great-circle distance math for geofence evaluation

/// Mean Earth radius in meters (IUGG value used by the geofence checks)
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two WGS84 points, in meters.
///
/// Pure function. Invalid coordinates are the caller's problem: NaN inputs
/// propagate to a NaN result, they are never clamped here.
pub fn distance_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        assert_eq!(distance_meters(64.1466, -21.9426, 64.1466, -21.9426), 0.0);
    }

    #[test]
    fn test_known_distance_reykjavik_kopavogur() {
        // Reykjavik city center to Kopavogur, roughly 4.8 km
        let d = distance_meters(64.1466, -21.9426, 64.1100, -21.9127);
        assert!((d - 4350.0).abs() < 300.0, "got {d}");
    }

    #[test]
    fn test_small_offset_is_meters_scale() {
        // ~0.001 deg latitude is ~111 m
        let d = distance_meters(64.0, -22.0, 64.001, -22.0);
        assert!((d - 111.0).abs() < 2.0, "got {d}");
    }

    #[test]
    fn test_symmetry() {
        let a = distance_meters(64.14, -21.94, 64.15, -21.90);
        let b = distance_meters(64.15, -21.90, 64.14, -21.94);
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_nan_propagates() {
        assert!(distance_meters(f64::NAN, 0.0, 0.0, 0.0).is_nan());
    }
}
