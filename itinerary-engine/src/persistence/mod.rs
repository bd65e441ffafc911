//! The persistence boundary.
//!
//! The engine keeps its graph in memory; a [`TripRepository`] mirrors it
//! somewhere durable. Writes are bulk upserts per collection plus one atomic
//! reorder, which is all a document store needs to offer. Nothing here is
//! transactional across collections.

mod document;
mod error;
mod json_file;
mod memory;

use crate::domain::{Day, DayId, Item, ItemId, Link, LinkId, Trip, TripId};
use crate::store::TripRecord;

pub use error::PersistenceError;
pub use json_file::JsonFileRepository;
pub use memory::MemoryRepository;

/// Durable storage for trips.
///
/// Deletes are idempotent: removing something that is not stored succeeds.
#[allow(async_fn_in_trait)]
pub trait TripRepository {
    /// Everything stored for a trip, or `None` if it was never saved.
    async fn load_trip_graph(&self, trip_id: &TripId) -> Result<Option<TripRecord>, PersistenceError>;

    async fn save_trip(&self, trip: &Trip) -> Result<(), PersistenceError>;

    /// Upsert days. Their trip must already be saved.
    async fn save_days(&self, days: &[Day]) -> Result<(), PersistenceError>;

    /// Upsert items. Their trip must already be saved.
    async fn save_items(&self, items: &[Item]) -> Result<(), PersistenceError>;

    /// Upsert links. Their trip must already be saved.
    async fn save_links(&self, links: &[Link]) -> Result<(), PersistenceError>;

    /// Replace a day's item order in one step.
    ///
    /// `ordered_ids` must be a permutation of the stored order.
    async fn reorder(&self, day_id: &DayId, ordered_ids: &[ItemId]) -> Result<(), PersistenceError>;

    async fn delete_days(&self, ids: &[DayId]) -> Result<(), PersistenceError>;

    async fn delete_items(&self, ids: &[ItemId]) -> Result<(), PersistenceError>;

    async fn delete_links(&self, ids: &[LinkId]) -> Result<(), PersistenceError>;

    /// Remove a trip and everything stored under it.
    async fn delete_trip(&self, trip_id: &TripId) -> Result<(), PersistenceError>;
}
