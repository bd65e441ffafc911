//! The planning feature's state container.
//!
//! [`TripPlanner`] owns the trip store together with its undo history and
//! undo windows. Every mutation goes through it, so every mutation is
//! undoable, and the derived workflows (route optimization, timeline
//! synthesis, geocoding, calendar export, syncing to a repository) all read
//! the same committed graph.

mod config;
mod error;
mod trip_planner;

pub use config::PlannerConfig;
pub use error::PlannerError;
pub use trip_planner::{GeocodeOutcome, TripPlanner};
