//! Geographic primitives: [`Location`] and haversine distance.
//!
//! Distance is road distance (haversine × a configurable road factor), not
//! straight-line, everywhere except the anchor-distance check in
//! `RoutingEngine`, which deliberately uses straight-line haversine while
//! detour search uses route distance from the `RoutingProvider` (§9 open
//! question: both are retained on purpose).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// `true` if both coordinates are within their valid ranges.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    /// Straight-line great-circle distance in kilometres.
    pub fn haversine_km(&self, other: &Location) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlng = (other.lng - self.lng).to_radians();

        let sin_dlat = (dlat * 0.5).sin();
        let sin_dlng = (dlng * 0.5).sin();
        let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
        let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
        EARTH_RADIUS_KM * c
    }

    /// Road-network-approximate distance: haversine scaled by `road_distance_factor`.
    pub fn road_distance_km(&self, other: &Location, road_distance_factor: f64) -> f64 {
        self.haversine_km(other) * road_distance_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_is_zero_for_identical_points() {
        let a = Location::new(49.83, -97.14);
        assert_eq!(a.haversine_km(&a), 0.0);
    }

    #[test]
    fn haversine_matches_known_distance_ballpark() {
        // Campus-area points from spec.md E1; ~2.6km apart in reality.
        let a = Location::new(49.83, -97.14);
        let b = Location::new(49.8075, -97.1325);
        let d = a.haversine_km(&b);
        assert!(d > 1.5 && d < 4.0, "distance was {d}");
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(!Location::new(91.0, 0.0).is_valid());
        assert!(!Location::new(0.0, 181.0).is_valid());
        assert!(Location::new(-90.0, -180.0).is_valid());
    }
}
