//! Great-circle distance between coordinates.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Build a point, rejecting non-finite or out-of-range values. `0,0` is
    /// the placeholder scrapers write for a missing location and is rejected.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng)
            && !(lat == 0.0 && lng == 0.0);
        valid.then_some(Self { lat, lng })
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self.lat, self.lng, other.lat, other.lng)
    }
}

/// Haversine distance in kilometres, rounded to one decimal place.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    (EARTH_RADIUS_KM * c * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANGGU: (f64, f64) = (-8.6478, 115.1395);
    const UBUD: (f64, f64) = (-8.5069, 115.2625);

    #[test]
    fn same_point_is_zero() {
        assert_eq!(haversine_km(CANGGU.0, CANGGU.1, CANGGU.0, CANGGU.1), 0.0);
    }

    #[test]
    fn known_distance_is_rounded() {
        let d = haversine_km(CANGGU.0, CANGGU.1, UBUD.0, UBUD.1);
        assert!((20.0..=21.0).contains(&d), "unexpected distance {d}");
        assert_eq!(d, (d * 10.0).round() / 10.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let there = haversine_km(CANGGU.0, CANGGU.1, UBUD.0, UBUD.1);
        let back = haversine_km(UBUD.0, UBUD.1, CANGGU.0, CANGGU.1);
        assert_eq!(there, back);
    }

    #[test]
    fn point_validation() {
        assert!(GeoPoint::new(CANGGU.0, CANGGU.1).is_some());
        assert!(GeoPoint::new(91.0, 0.0).is_none());
        assert!(GeoPoint::new(0.0, -181.0).is_none());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_none());
        assert!(GeoPoint::new(0.0, 0.0).is_none());
        assert!(GeoPoint::new(0.0, 115.1).is_some());
    }
}
