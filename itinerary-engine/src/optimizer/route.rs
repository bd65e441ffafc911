//! Nearest-neighbour construction followed by 2-opt improvement.

use std::fmt;

use tracing::{debug, trace};

use crate::domain::{RoutePoint, TransportMode};
use crate::geo::{self, WeightTable};

use super::options::{OptimizeOptions, OptimizeRange};

/// Candidates closer than this in cost or distance count as tied.
const TIE_EPSILON: f64 = 1e-12;

/// Error from invalid optimizer options.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptimizeError {
    #[error("start index {index} out of range for {len} points")]
    StartOutOfRange { index: usize, len: usize },

    #[error("range [{start}, {end}] out of bounds for {len} points")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    #[error("range start {start} is after range end {end}")]
    InvertedRange { start: usize, end: usize },
}

/// What the optimizer did.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Too few points to reorder; the order is the identity.
    Unnecessary { points: usize },

    /// The order was searched.
    Optimized {
        /// Path cost of the nearest-neighbour seed.
        seed_cost: f64,
        /// Path cost after 2-opt; never above `seed_cost`.
        cost: f64,
        /// Number of 2-opt reversals applied.
        moves: usize,
        /// True if the move cap stopped the search early.
        capped: bool,
    },
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Unnecessary { points } => write!(
                f,
                "optimization unnecessary: {points} stop(s), fewer than 3 to reorder"
            ),
            Outcome::Optimized {
                seed_cost,
                cost,
                moves,
                ..
            } => write!(
                f,
                "optimized: cost {cost:.3} (seed {seed_cost:.3}) after {moves} move(s)"
            ),
        }
    }
}

/// A visiting order over the input points.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOrder {
    /// A permutation of `0..n`: `order[k]` is the index of the k-th visited point.
    pub order: Vec<usize>,
    pub outcome: Outcome,
}

impl RouteOrder {
    fn identity(n: usize, eligible: usize) -> Self {
        Self {
            order: (0..n).collect(),
            outcome: Outcome::Unnecessary { points: eligible },
        }
    }

    /// True if the optimizer actually ran.
    pub fn is_optimized(&self) -> bool {
        matches!(self.outcome, Outcome::Optimized { .. })
    }

    /// True if the order leaves every point where it was.
    pub fn is_identity(&self) -> bool {
        self.order.iter().enumerate().all(|(pos, &idx)| pos == idx)
    }

    /// Rearrange a slice parallel to the optimized points.
    ///
    /// Returns `None` if the slice length does not match the order.
    pub fn apply<T: Clone>(&self, values: &[T]) -> Option<Vec<T>> {
        if values.len() != self.order.len() {
            return None;
        }
        Some(self.order.iter().map(|&idx| values[idx].clone()).collect())
    }
}

/// Total open-path cost of visiting `points` in `order`.
pub fn path_cost(
    points: &[RoutePoint],
    order: &[usize],
    mode: TransportMode,
    weights: &WeightTable,
) -> f64 {
    order
        .windows(2)
        .map(|pair| {
            geo::cost(
                &points[pair[0]].coordinate,
                &points[pair[1]].coordinate,
                mode,
                weights,
            )
        })
        .sum()
}

/// Compute a visiting order that approximately minimizes weighted cost.
///
/// Fewer than three eligible points is not an error: the identity order is
/// returned with [`Outcome::Unnecessary`].
///
/// # Examples
///
/// ```
/// use itinerary_engine::domain::{Coordinate, RoutePoint, TransportMode};
/// use itinerary_engine::optimizer::{OptimizeOptions, optimize};
///
/// let points: Vec<RoutePoint> = [(0.0, 0.0), (0.0, 2.0), (0.0, 1.0)]
///     .into_iter()
///     .map(|(lat, lng)| Coordinate::new(lat, lng).unwrap().into())
///     .collect();
///
/// let route = optimize(&points, &OptimizeOptions::new(TransportMode::Car)).unwrap();
/// assert_eq!(route.order, vec![0, 2, 1]);
/// ```
pub fn optimize(points: &[RoutePoint], opts: &OptimizeOptions) -> Result<RouteOrder, OptimizeError> {
    let n = points.len();
    let segment = resolve_segment(n, opts)?;

    if n <= 2 || segment.len() <= 2 {
        debug!(points = n, segment = segment.len(), "optimization unnecessary");
        return Ok(RouteOrder::identity(n, segment.len().min(n)));
    }

    let cost = |a: usize, b: usize| {
        geo::cost(
            &points[a].coordinate,
            &points[b].coordinate,
            opts.mode,
            &opts.weights,
        )
    };

    let mut order: Vec<usize> = (0..n).collect();
    let seed = nearest_neighbour(points, &segment, opts.start_index, &cost);
    order[segment.start..=segment.end].copy_from_slice(&seed);

    let seed_cost = path_cost(points, &order, opts.mode, &opts.weights);

    // Boundaries without an outside neighbour (or that are locked) stay put.
    let lo = if segment.lock_start || segment.start == 0 {
        segment.start + 1
    } else {
        segment.start
    };
    let hi = if segment.lock_end || segment.end == n - 1 {
        segment.end - 1
    } else {
        segment.end
    };

    let (moves, capped) = two_opt(&mut order, lo, hi, opts, &cost);
    let final_cost = path_cost(points, &order, opts.mode, &opts.weights);

    debug!(
        points = n,
        seed_cost,
        cost = final_cost,
        moves,
        capped,
        "route optimized"
    );

    Ok(RouteOrder {
        order,
        outcome: Outcome::Optimized {
            seed_cost,
            cost: final_cost,
            moves,
            capped,
        },
    })
}

/// Validate the options and return the segment eligible for reordering.
fn resolve_segment(n: usize, opts: &OptimizeOptions) -> Result<OptimizeRange, OptimizeError> {
    match opts.range {
        Some(range) => {
            if range.start > range.end {
                return Err(OptimizeError::InvertedRange {
                    start: range.start,
                    end: range.end,
                });
            }
            if range.end >= n {
                return Err(OptimizeError::RangeOutOfBounds {
                    start: range.start,
                    end: range.end,
                    len: n,
                });
            }
            Ok(range)
        }
        None => {
            if n > 0 && opts.start_index >= n {
                return Err(OptimizeError::StartOutOfRange {
                    index: opts.start_index,
                    len: n,
                });
            }
            Ok(OptimizeRange::new(0, n.saturating_sub(1)))
        }
    }
}

/// A candidate next stop during construction.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    cost: f64,
    distance: f64,
    rating: f64,
}

impl Candidate {
    /// Tie-break: cost, then raw distance, then rating. Equal on all three
    /// keeps the incumbent, which was seen first.
    fn beats(&self, other: &Candidate) -> bool {
        if (self.cost - other.cost).abs() > TIE_EPSILON {
            return self.cost < other.cost;
        }
        if (self.distance - other.distance).abs() > TIE_EPSILON {
            return self.distance < other.distance;
        }
        self.rating > other.rating
    }
}

/// Build the segment's seed order greedily.
fn nearest_neighbour(
    points: &[RoutePoint],
    segment: &OptimizeRange,
    start_index: usize,
    cost: &impl Fn(usize, usize) -> f64,
) -> Vec<usize> {
    let mut remaining: Vec<usize> = (segment.start..=segment.end).collect();
    let mut seq = Vec::with_capacity(remaining.len());

    let pinned_last = if segment.lock_end {
        remaining.retain(|&idx| idx != segment.end);
        Some(segment.end)
    } else {
        None
    };

    let mut current = if segment.lock_start {
        remaining.retain(|&idx| idx != segment.start);
        seq.push(segment.start);
        segment.start
    } else if segment.start > 0 {
        // Continue from the fixed point just before the segment.
        segment.start - 1
    } else {
        let first = if remaining.contains(&start_index) {
            start_index
        } else {
            segment.start
        };
        remaining.retain(|&idx| idx != first);
        seq.push(first);
        first
    };

    while !remaining.is_empty() {
        let mut best: Option<Candidate> = None;
        for &idx in &remaining {
            let candidate = Candidate {
                index: idx,
                cost: cost(current, idx),
                distance: geo::distance_km(&points[current].coordinate, &points[idx].coordinate),
                rating: points[idx].rating.unwrap_or(f64::NEG_INFINITY),
            };
            if best.is_none_or(|b| candidate.beats(&b)) {
                best = Some(candidate);
            }
        }

        let Some(best) = best else { break };
        trace!(from = current, to = best.index, cost = best.cost, "nearest neighbour step");
        remaining.retain(|&idx| idx != best.index);
        seq.push(best.index);
        current = best.index;
    }

    if let Some(last) = pinned_last {
        seq.push(last);
    }

    seq
}

/// Apply improving reversals of `order[i..=k]` for `lo <= i < k <= hi`.
///
/// Requires `lo >= 1` and `hi + 1 < order.len()` so both neighbours of every
/// reversed segment exist. Returns the number of moves and whether an
/// improving move was left unapplied because of the cap.
fn two_opt(
    order: &mut [usize],
    lo: usize,
    hi: usize,
    opts: &OptimizeOptions,
    cost: &impl Fn(usize, usize) -> f64,
) -> (usize, bool) {
    let mut moves = 0;
    if hi <= lo {
        return (moves, false);
    }

    loop {
        let mut improved = false;

        for i in lo..hi {
            for k in (i + 1)..=hi {
                let (a, b) = (order[i - 1], order[i]);
                let (c, d) = (order[k], order[k + 1]);
                let delta = cost(a, c) + cost(b, d) - cost(a, b) - cost(c, d);

                if delta < -opts.epsilon {
                    if moves >= opts.max_iterations {
                        return (moves, true);
                    }
                    order[i..=k].reverse();
                    moves += 1;
                    improved = true;
                    trace!(i, k, delta, "2-opt reversal");
                }
            }
        }

        if !improved {
            return (moves, false);
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::Coordinate;
    use proptest::prelude::*;

    /// Points scattered over a city-sized box.
    fn points_strategy(max: usize) -> impl Strategy<Value = Vec<RoutePoint>> {
        prop::collection::vec(
            (10.70f64..10.85, 106.60f64..106.80, prop::option::of(1.0f64..5.0)),
            0..max,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .map(|(lat, lng, rating)| RoutePoint {
                    coordinate: Coordinate::new(lat, lng).unwrap(),
                    rating,
                })
                .collect()
        })
    }

    fn mode_strategy() -> impl Strategy<Value = TransportMode> {
        prop::sample::select(TransportMode::ALL.to_vec())
    }

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut seen = vec![false; n];
        order.len() == n
            && order.iter().all(|&idx| {
                if idx >= n || seen[idx] {
                    return false;
                }
                seen[idx] = true;
                true
            })
    }

    proptest! {
        #[test]
        fn returns_permutation(pts in points_strategy(14), mode in mode_strategy()) {
            let route = optimize(&pts, &OptimizeOptions::new(mode)).unwrap();
            prop_assert!(is_permutation(&route.order, pts.len()), "{:?}", route.order);
        }

        #[test]
        fn two_opt_never_degrades_seed(pts in points_strategy(14), mode in mode_strategy()) {
            let route = optimize(&pts, &OptimizeOptions::new(mode)).unwrap();
            if let Outcome::Optimized { seed_cost, cost, .. } = route.outcome {
                prop_assert!(cost <= seed_cost + 1e-9, "{cost} > {seed_cost}");
            }
        }

        #[test]
        fn range_restriction_holds(
            pts in points_strategy(12),
            a in 0usize..12,
            b in 0usize..12,
            lock_start in any::<bool>(),
            lock_end in any::<bool>(),
        ) {
            prop_assume!(!pts.is_empty());
            let n = pts.len();
            let (start, end) = (a.min(b) % n, a.max(b) % n);
            prop_assume!(start <= end);

            let range = OptimizeRange { start, end, lock_start, lock_end };
            let opts = OptimizeOptions::default().with_range(range);
            let route = optimize(&pts, &opts).unwrap();

            prop_assert!(is_permutation(&route.order, n));
            for pos in (0..start).chain(end + 1..n) {
                prop_assert_eq!(route.order[pos], pos);
            }
            if lock_start {
                prop_assert_eq!(route.order[start], start);
            }
            if lock_end {
                prop_assert_eq!(route.order[end], end);
            }
        }

        #[test]
        fn identical_input_identical_output(pts in points_strategy(10)) {
            let opts = OptimizeOptions::default();
            prop_assert_eq!(optimize(&pts, &opts).unwrap(), optimize(&pts, &opts).unwrap());
        }
    }
}
