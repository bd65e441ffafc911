//! Planner configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::TransportMode;
use crate::geo::WeightTable;
use crate::optimizer::OptimizeOptions;

/// Configuration parameters for a [`TripPlanner`](super::TripPlanner).
///
/// Deserializing fills any missing field with its default, so a config file
/// only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Maximum number of undoable changes kept.
    pub history_depth: usize,

    /// How long a scheduled change stays revocable (milliseconds).
    pub undo_window_ms: u64,

    /// Cap on applied 2-opt moves per optimization.
    pub max_iterations: usize,

    /// Cost improvements at or below this are ignored.
    pub epsilon: f64,

    /// Estimates requested concurrently during synthesis.
    pub estimate_batch_size: usize,

    /// Per-mode distance weights for the optimizer.
    pub weights: WeightTable,
}

impl PlannerConfig {
    /// Create a new configuration with the given parameters and default
    /// weights.
    pub fn new(
        history_depth: usize,
        undo_window_ms: u64,
        max_iterations: usize,
        epsilon: f64,
        estimate_batch_size: usize,
    ) -> Self {
        Self {
            history_depth,
            undo_window_ms,
            max_iterations,
            epsilon,
            estimate_batch_size,
            weights: WeightTable::default(),
        }
    }

    /// Parse a JSON config.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns the undo window as a Duration.
    pub fn undo_window(&self) -> Duration {
        Duration::from_millis(self.undo_window_ms)
    }

    /// Optimizer options for `mode` under this config.
    pub fn optimize_options(&self, mode: TransportMode) -> OptimizeOptions {
        let mut opts = OptimizeOptions::new(mode)
            .with_weights(self.weights.clone())
            .with_max_iterations(self.max_iterations);
        opts.epsilon = self.epsilon;
        opts
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            history_depth: 100,
            undo_window_ms: 5_000,
            max_iterations: 2_000,
            epsilon: 1e-9,
            estimate_batch_size: 8,
            weights: WeightTable::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlannerConfig::default();

        assert_eq!(config.history_depth, 100);
        assert_eq!(config.undo_window_ms, 5_000);
        assert_eq!(config.max_iterations, 2_000);
        assert_eq!(config.epsilon, 1e-9);
        assert_eq!(config.estimate_batch_size, 8);
        assert_eq!(config.weights.weight(TransportMode::Walking), 1.8);
    }

    #[test]
    fn duration_methods() {
        let config = PlannerConfig::default();
        assert_eq!(config.undo_window(), Duration::from_secs(5));
    }

    #[test]
    fn custom_config() {
        let config = PlannerConfig::new(10, 3_000, 50, 1e-6, 2);

        assert_eq!(config.history_depth, 10);
        assert_eq!(config.undo_window(), Duration::from_secs(3));
        assert_eq!(config.max_iterations, 50);
        assert_eq!(config.epsilon, 1e-6);
        assert_eq!(config.estimate_batch_size, 2);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PlannerConfig::from_json(
            r#"{ "undo_window_ms": 8000, "weights": { "walking": 2.5 } }"#,
        )
        .unwrap();

        assert_eq!(config.undo_window(), Duration::from_secs(8));
        assert_eq!(config.history_depth, 100);
        assert_eq!(config.weights.weight(TransportMode::Walking), 2.5);
        // A weights table replaces the defaults wholesale.
        assert_eq!(config.weights.weight(TransportMode::Transit), 1.0);
    }

    #[test]
    fn optimize_options_follow_config() {
        let config = PlannerConfig::new(10, 3_000, 50, 1e-6, 2);
        let opts = config.optimize_options(TransportMode::Grab);
        assert_eq!(opts.mode, TransportMode::Grab);
        assert_eq!(opts.max_iterations, 50);
        assert_eq!(opts.epsilon, 1e-6);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(PlannerConfig::from_json("{ \"history_depth\": -1 }").is_err());
    }
}
