//! Geographic cost model.
//!
//! Pure functions turning two coordinates and a transport mode into a
//! comparable cost: great-circle distance scaled by a per-mode weight.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Coordinate, TransportMode};

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates (haversine formula).
pub fn distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let d_lat = (b.lat() - a.lat()).to_radians();
    let d_lng = (b.lng() - a.lng()).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat().to_radians().cos() * b.lat().to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Weighted travel cost between two coordinates.
pub fn cost(a: &Coordinate, b: &Coordinate, mode: TransportMode, weights: &WeightTable) -> f64 {
    distance_km(a, b) * weights.weight(mode)
}

/// Per-mode multipliers applied to distance.
///
/// Slower or more tiring modes weigh more, so the optimizer prefers shorter
/// hops when walking than when driving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable {
    weights: BTreeMap<TransportMode, f64>,
}

impl WeightTable {
    /// A table with no entries: every mode weighs 1.0.
    pub fn uniform() -> Self {
        Self {
            weights: BTreeMap::new(),
        }
    }

    /// Weight for a mode, 1.0 if the table has no entry for it.
    pub fn weight(&self, mode: TransportMode) -> f64 {
        self.weights.get(&mode).copied().unwrap_or(1.0)
    }

    /// Override the weight of one mode.
    pub fn with(mut self, mode: TransportMode, weight: f64) -> Self {
        self.weights.insert(mode, weight);
        self
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        WeightTable::uniform()
            .with(TransportMode::Driving, 1.0)
            .with(TransportMode::Car, 1.0)
            .with(TransportMode::Grab, 1.0)
            .with(TransportMode::Transit, 1.2)
            .with(TransportMode::Bicycling, 1.35)
            .with(TransportMode::Walking, 1.8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn paris_to_london() {
        let paris = coord(48.8566, 2.3522);
        let london = coord(51.5074, -0.1278);
        let d = distance_km(&paris, &london);
        assert!((d - 343.5).abs() < 1.0, "got {d}");
    }

    #[test]
    fn zero_distance_to_self() {
        let p = coord(10.77, 106.70);
        assert_eq!(distance_km(&p, &p), 0.0);
    }

    #[test]
    fn antipodal_points_are_half_circumference() {
        let d = distance_km(&coord(0.0, 0.0), &coord(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn default_weights() {
        let w = WeightTable::default();
        assert_eq!(w.weight(TransportMode::Car), 1.0);
        assert_eq!(w.weight(TransportMode::Grab), 1.0);
        assert_eq!(w.weight(TransportMode::Transit), 1.2);
        assert_eq!(w.weight(TransportMode::Bicycling), 1.35);
        assert_eq!(w.weight(TransportMode::Walking), 1.8);
    }

    #[test]
    fn cost_scales_distance() {
        let a = coord(10.77, 106.70);
        let b = coord(10.78, 106.71);
        let w = WeightTable::default();
        let d = distance_km(&a, &b);
        assert!((cost(&a, &b, TransportMode::Walking, &w) - d * 1.8).abs() < 1e-12);
        assert!((cost(&a, &b, TransportMode::Driving, &w) - d).abs() < 1e-12);
    }

    #[test]
    fn overridden_weight() {
        let w = WeightTable::default().with(TransportMode::Walking, 3.0);
        assert_eq!(w.weight(TransportMode::Walking), 3.0);
        assert_eq!(WeightTable::uniform().weight(TransportMode::Walking), 1.0);
    }

    #[test]
    fn weight_table_serde() {
        let json = r#"{"walking": 2.5}"#;
        let w: WeightTable = serde_json::from_str(json).unwrap();
        assert_eq!(w.weight(TransportMode::Walking), 2.5);
        assert_eq!(w.weight(TransportMode::Transit), 1.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn coordinate_strategy() -> impl Strategy<Value = Coordinate> {
        (-89.0f64..89.0, -179.0f64..179.0).prop_map(|(lat, lng)| Coordinate::new(lat, lng).unwrap())
    }

    proptest! {
        #[test]
        fn distance_is_symmetric(a in coordinate_strategy(), b in coordinate_strategy()) {
            let ab = distance_km(&a, &b);
            let ba = distance_km(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-9, "{ab} != {ba}");
        }

        #[test]
        fn distance_is_non_negative(a in coordinate_strategy(), b in coordinate_strategy()) {
            prop_assert!(distance_km(&a, &b) >= 0.0);
        }

        #[test]
        fn triangle_inequality(
            a in coordinate_strategy(),
            b in coordinate_strategy(),
            c in coordinate_strategy(),
        ) {
            let ac = distance_km(&a, &c);
            let via_b = distance_km(&a, &b) + distance_km(&b, &c);
            prop_assert!(ac <= via_b + 1e-6, "{ac} > {via_b}");
        }
    }
}
