//! Domain types for the itinerary planning engine.
//!
//! This module contains the entities of the trip graph and the small value
//! types they are built from. Value types enforce their invariants at
//! construction time, so code that receives them can trust their validity.

mod block;
mod coordinate;
mod entity;
mod error;
mod id;
mod mode;

pub use block::TimelineBlock;
pub use coordinate::{Coordinate, InvalidCoordinate, RoutePoint};
pub use entity::{Day, Item, ItemKind, ItemPatch, Link, NewItem, NewTrip, Trip};
pub use error::GraphError;
pub use id::{DayId, InvalidId, ItemId, LinkId, TripId};
pub use mode::{TransportMode, UnknownMode};
