//! Route optimizer.
//!
//! Orders a day's stops to approximately minimize total weighted travel cost.
//! A nearest-neighbour pass builds a seed tour, then 2-opt reversals improve
//! it until no move helps or the move budget runs out.
//!
//! The optimizer works on index permutations only. It never touches the
//! caller's data; rebuilding the item order from the returned indices is
//! the caller's job.

mod options;
mod route;

pub use options::{OptimizeOptions, OptimizeRange};
pub use route::{OptimizeError, Outcome, RouteOrder, optimize, path_cost};
