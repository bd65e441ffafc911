//! Offline estimator from straight-line distance and per-mode speeds.

use std::collections::BTreeMap;

use crate::domain::{Coordinate, TransportMode};
use crate::geo::distance_km;

use super::estimator::{Estimate, EstimateError, Estimator};

/// Road distance over straight-line distance, typical of city grids.
pub const DEFAULT_CIRCUITY: f64 = 1.3;

/// Estimates legs as `distance * circuity` travelled at a fixed speed.
///
/// Fares are `base + per_km * road_km` per mode; modes without a fare entry
/// are free.
#[derive(Debug, Clone)]
pub struct SpeedTableEstimator {
    circuity: f64,
    /// km/h
    speeds: BTreeMap<TransportMode, f64>,
    /// (base, per km)
    fares: BTreeMap<TransportMode, (f64, f64)>,
}

impl Default for SpeedTableEstimator {
    fn default() -> Self {
        let speeds = BTreeMap::from([
            (TransportMode::Driving, 30.0),
            (TransportMode::Car, 30.0),
            (TransportMode::Grab, 28.0),
            (TransportMode::Transit, 20.0),
            (TransportMode::Bicycling, 14.0),
            (TransportMode::Walking, 4.8),
        ]);
        let fares = BTreeMap::from([
            (TransportMode::Driving, (0.0, 0.15)),
            (TransportMode::Car, (0.0, 0.15)),
            (TransportMode::Grab, (1.0, 0.5)),
            (TransportMode::Transit, (0.5, 0.05)),
        ]);
        Self {
            circuity: DEFAULT_CIRCUITY,
            speeds,
            fares,
        }
    }
}

impl SpeedTableEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_circuity(mut self, circuity: f64) -> Self {
        self.circuity = circuity;
        self
    }

    pub fn with_speed(mut self, mode: TransportMode, kmh: f64) -> Self {
        self.speeds.insert(mode, kmh);
        self
    }

    pub fn with_fare(mut self, mode: TransportMode, base: f64, per_km: f64) -> Self {
        self.fares.insert(mode, (base, per_km));
        self
    }

    /// Synchronous form of [`Estimator::estimate`].
    pub fn estimate_leg(&self, origin: Coordinate, destination: Coordinate, mode: TransportMode) -> Option<Estimate> {
        let speed = *self.speeds.get(&mode)?;
        if speed <= 0.0 {
            return None;
        }
        let road_km = distance_km(&origin, &destination) * self.circuity;
        if road_km == 0.0 {
            return Some(Estimate {
                minutes: 0,
                cost: 0.0,
            });
        }

        let minutes = (road_km / speed * 60.0).ceil().max(1.0) as u32;
        let cost = self
            .fares
            .get(&mode)
            .map(|(base, per_km)| base + per_km * road_km)
            .unwrap_or(0.0);
        Some(Estimate {
            minutes,
            cost: (cost * 100.0).round() / 100.0,
        })
    }
}

impl Estimator for SpeedTableEstimator {
    async fn estimate(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
    ) -> Result<Option<Estimate>, EstimateError> {
        Ok(self.estimate_leg(origin, destination, mode))
    }
}
