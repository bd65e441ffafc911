//! In-memory repository.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::{Day, DayId, Item, ItemId, Link, LinkId, Trip, TripId};
use crate::store::TripRecord;

use super::document::{self, Documents};
use super::{PersistenceError, TripRepository};

/// Repository that keeps documents in memory.
///
/// Clones share the same storage, which makes it a stand-in for a remote
/// store in tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    docs: Arc<RwLock<Documents>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every stored trip.
    pub async fn trip_ids(&self) -> Vec<TripId> {
        self.docs.read().await.keys().cloned().collect()
    }
}

impl TripRepository for MemoryRepository {
    async fn load_trip_graph(&self, trip_id: &TripId) -> Result<Option<TripRecord>, PersistenceError> {
        Ok(self.docs.read().await.get(trip_id).map(|doc| doc.to_record()))
    }

    async fn save_trip(&self, trip: &Trip) -> Result<(), PersistenceError> {
        document::save_trip(&mut *self.docs.write().await, trip);
        Ok(())
    }

    async fn save_days(&self, days: &[Day]) -> Result<(), PersistenceError> {
        document::save_days(&mut *self.docs.write().await, days)
    }

    async fn save_items(&self, items: &[Item]) -> Result<(), PersistenceError> {
        document::save_items(&mut *self.docs.write().await, items)
    }

    async fn save_links(&self, links: &[Link]) -> Result<(), PersistenceError> {
        document::save_links(&mut *self.docs.write().await, links)
    }

    async fn reorder(&self, day_id: &DayId, ordered_ids: &[ItemId]) -> Result<(), PersistenceError> {
        document::reorder(&mut *self.docs.write().await, day_id, ordered_ids)
    }

    async fn delete_days(&self, ids: &[DayId]) -> Result<(), PersistenceError> {
        document::delete_days(&mut *self.docs.write().await, ids);
        Ok(())
    }

    async fn delete_items(&self, ids: &[ItemId]) -> Result<(), PersistenceError> {
        document::delete_items(&mut *self.docs.write().await, ids);
        Ok(())
    }

    async fn delete_links(&self, ids: &[LinkId]) -> Result<(), PersistenceError> {
        document::delete_links(&mut *self.docs.write().await, ids);
        Ok(())
    }

    async fn delete_trip(&self, trip_id: &TripId) -> Result<(), PersistenceError> {
        self.docs.write().await.remove(trip_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemKind, NewItem, NewTrip};
    use crate::store::TripStore;
    use chrono::NaiveDate;

    fn sample() -> (TripRecord, DayId, Vec<ItemId>) {
        let date = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let mut store = TripStore::new();
        let trip = store.create_trip(NewTrip::new("Da Nang", date, 1));
        let day = store.add_day(&trip, date).unwrap();
        let items = ["Marble Mountains", "My Khe", "Dragon Bridge"]
            .iter()
            .map(|t| store.add_item(&day, NewItem::new(ItemKind::Stop, *t)).unwrap())
            .collect();
        (store.graph().record(&trip).unwrap(), day, items)
    }

    async fn save(repo: &MemoryRepository, record: &TripRecord) {
        repo.save_trip(&record.trip).await.unwrap();
        repo.save_days(&record.days).await.unwrap();
        repo.save_items(&record.items).await.unwrap();
        repo.save_links(&record.links).await.unwrap();
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let repo = MemoryRepository::new();
        let (record, _, _) = sample();
        save(&repo, &record).await;

        let loaded = repo.load_trip_graph(&record.trip.id).await.unwrap();
        assert_eq!(loaded, Some(record.clone()));
        assert_eq!(repo.trip_ids().await, vec![record.trip.id.clone()]);
    }

    #[tokio::test]
    async fn missing_trip_loads_as_none() {
        let repo = MemoryRepository::new();
        let id = TripId::new("nope").unwrap();
        assert_eq!(repo.load_trip_graph(&id).await, Ok(None));
    }

    #[tokio::test]
    async fn children_need_a_saved_trip() {
        let repo = MemoryRepository::new();
        let (record, _, _) = sample();
        let err = repo.save_days(&record.days).await.unwrap_err();
        assert_eq!(err, PersistenceError::UnknownTrip(record.trip.id.clone()));
    }

    #[tokio::test]
    async fn reorder_is_checked() {
        let repo = MemoryRepository::new();
        let (record, day, items) = sample();
        save(&repo, &record).await;

        let reversed: Vec<ItemId> = items.iter().rev().cloned().collect();
        repo.reorder(&day, &reversed).await.unwrap();
        let loaded = repo.load_trip_graph(&record.trip.id).await.unwrap().unwrap();
        assert_eq!(loaded.days[0].item_ids, reversed);
        // Items come back in the new visiting order.
        assert_eq!(loaded.items[0].id, items[2]);

        let partial = &items[..2];
        assert_eq!(
            repo.reorder(&day, partial).await,
            Err(PersistenceError::ReorderMismatch(day.clone()))
        );
        let ghost = DayId::new("ghost").unwrap();
        assert_eq!(
            repo.reorder(&ghost, &[]).await,
            Err(PersistenceError::UnknownDay(ghost))
        );
    }

    #[tokio::test]
    async fn deletes_are_idempotent() {
        let repo = MemoryRepository::new();
        let (record, day, items) = sample();
        save(&repo, &record).await;

        repo.delete_items(&items[..1]).await.unwrap();
        repo.delete_items(&items[..1]).await.unwrap();
        repo.delete_days(&[day.clone()]).await.unwrap();
        let loaded = repo.load_trip_graph(&record.trip.id).await.unwrap().unwrap();
        assert!(loaded.days.is_empty());
        assert_eq!(loaded.items.len(), 2);

        repo.delete_trip(&record.trip.id).await.unwrap();
        repo.delete_trip(&record.trip.id).await.unwrap();
        assert!(repo.trip_ids().await.is_empty());
    }

    #[tokio::test]
    async fn clones_share_storage() {
        let repo = MemoryRepository::new();
        let other = repo.clone();
        let (record, _, _) = sample();
        save(&repo, &record).await;
        assert!(other.load_trip_graph(&record.trip.id).await.unwrap().is_some());
    }
}
