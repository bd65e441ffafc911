//! Trip graph store.
//!
//! The normalized Trip/Day/Item/Link graph and the only operations allowed
//! to change it. [`TripGraph`] is the plain snapshot with pure selectors;
//! [`TripStore`] owns one and exposes the mutations.
//!
//! Every mutation validates its references before touching anything, so a
//! returned [`GraphError`](crate::domain::GraphError) always means the
//! graph is unchanged.

mod graph;
mod trip_store;

pub use graph::{TripGraph, TripRecord};
pub use trip_store::{Cascade, TripStore};
