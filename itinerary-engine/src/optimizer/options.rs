//! Optimizer options.

use crate::domain::TransportMode;
use crate::geo::WeightTable;

/// Default cap on applied 2-opt moves.
pub const DEFAULT_MAX_ITERATIONS: usize = 2000;

/// Minimum improvement for a 2-opt move to count, in cost units.
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// A contiguous slice of the point list that is the only part allowed to
/// change order.
///
/// Both bounds are inclusive indices into the point list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizeRange {
    pub start: usize,
    pub end: usize,
    /// Keep the point at `start` first within the segment.
    pub lock_start: bool,
    /// Keep the point at `end` last within the segment.
    pub lock_end: bool,
}

impl OptimizeRange {
    /// A range with neither boundary locked.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            lock_start: false,
            lock_end: false,
        }
    }

    /// Pin both boundary points in place ("keep my hotel as the anchor").
    pub fn locked(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            lock_start: true,
            lock_end: true,
        }
    }

    pub fn len(&self) -> usize {
        (self.end + 1).saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Options for [`optimize`](super::optimize).
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Mode whose weight scales distances.
    pub mode: TransportMode,

    /// Weight table used to turn distance into cost.
    pub weights: WeightTable,

    /// Point the tour starts from when no range is given.
    pub start_index: usize,

    /// Restrict reordering to a sub-range of the points.
    pub range: Option<OptimizeRange>,

    /// Maximum number of applied 2-opt moves.
    /// The cap guarantees termination; it is not needed for correctness.
    pub max_iterations: usize,

    /// Improvements at or below this are treated as ties.
    pub epsilon: f64,
}

impl OptimizeOptions {
    /// Options for the given mode with default weights and limits.
    pub fn new(mode: TransportMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_weights(mut self, weights: WeightTable) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_start(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn with_range(mut self, range: OptimizeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            mode: TransportMode::default(),
            weights: WeightTable::default(),
            start_index: 0,
            range: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let opts = OptimizeOptions::default();
        assert_eq!(opts.mode, TransportMode::Driving);
        assert_eq!(opts.start_index, 0);
        assert_eq!(opts.range, None);
        assert_eq!(opts.max_iterations, 2000);
        assert_eq!(opts.epsilon, 1e-9);
    }

    #[test]
    fn builder_methods() {
        let opts = OptimizeOptions::new(TransportMode::Walking)
            .with_start(2)
            .with_range(OptimizeRange::locked(1, 4))
            .with_max_iterations(10);

        assert_eq!(opts.mode, TransportMode::Walking);
        assert_eq!(opts.start_index, 2);
        assert_eq!(opts.range, Some(OptimizeRange::locked(1, 4)));
        assert_eq!(opts.max_iterations, 10);
    }

    #[test]
    fn range_len() {
        assert_eq!(OptimizeRange::new(2, 5).len(), 4);
        assert_eq!(OptimizeRange::new(3, 3).len(), 1);
        assert!(!OptimizeRange::new(3, 3).is_empty());
    }
}
