//! Itinerary planning engine.
//!
//! Holds a trip as a graph of days, stops and the moves between them, and
//! answers the questions a trip planner asks of it: what order visits these
//! stops fastest, how long is each hop, what does the day look like as a
//! calendar, and how do I take back what I just did.
//!
//! [`planner::TripPlanner`] is the entry point; the other modules are its
//! building blocks and usable on their own.

pub mod calendar;
pub mod domain;
pub mod geo;
pub mod geocode;
pub mod history;
pub mod optimizer;
pub mod persistence;
pub mod planner;
pub mod store;
pub mod timeline;
