//! Per-trip documents shared by the repository implementations.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{Day, DayId, Item, ItemId, Link, LinkId, Trip, TripId};
use crate::store::TripRecord;

use super::PersistenceError;

/// Everything stored for one trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(super) struct TripDocument {
    pub trip: Trip,
    #[serde(default)]
    pub days: BTreeMap<DayId, Day>,
    #[serde(default)]
    pub items: BTreeMap<ItemId, Item>,
    #[serde(default)]
    pub links: BTreeMap<LinkId, Link>,
}

impl TripDocument {
    fn new(trip: Trip) -> Self {
        Self {
            trip,
            days: BTreeMap::new(),
            items: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }

    /// Days by display order, items by visiting order.
    pub fn to_record(&self) -> TripRecord {
        let mut days: Vec<Day> = self.days.values().cloned().collect();
        days.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));

        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(self.items.len());
        for day in &days {
            for id in &day.item_ids {
                if let Some(item) = self.items.get(id)
                    && seen.insert(id)
                {
                    items.push(item.clone());
                }
            }
        }
        // Items no stored day lists yet still belong to the trip.
        items.extend(
            self.items
                .values()
                .filter(|item| !seen.contains(&item.id))
                .cloned(),
        );

        let mut links: Vec<Link> = self.links.values().cloned().collect();
        links.sort_by(|a, b| {
            a.day_id
                .cmp(&b.day_id)
                .then_with(|| a.order.total_cmp(&b.order))
        });

        TripRecord {
            trip: self.trip.clone(),
            days,
            items,
            links,
        }
    }
}

/// All documents of a repository, keyed by trip.
pub(super) type Documents = BTreeMap<TripId, TripDocument>;

fn document<'a>(docs: &'a mut Documents, trip_id: &TripId) -> Result<&'a mut TripDocument, PersistenceError> {
    docs.get_mut(trip_id)
        .ok_or_else(|| PersistenceError::UnknownTrip(trip_id.clone()))
}

fn ensure_trips<'a>(docs: &Documents, mut trip_ids: impl Iterator<Item = &'a TripId>) -> Result<(), PersistenceError> {
    match trip_ids.find(|id| !docs.contains_key(*id)) {
        Some(missing) => Err(PersistenceError::UnknownTrip(missing.clone())),
        None => Ok(()),
    }
}

pub(super) fn save_trip(docs: &mut Documents, trip: &Trip) {
    match docs.get_mut(&trip.id) {
        Some(doc) => doc.trip = trip.clone(),
        None => {
            docs.insert(trip.id.clone(), TripDocument::new(trip.clone()));
        }
    }
}

pub(super) fn save_days(docs: &mut Documents, days: &[Day]) -> Result<(), PersistenceError> {
    ensure_trips(docs, days.iter().map(|d| &d.trip_id))?;
    for day in days {
        document(docs, &day.trip_id)?
            .days
            .insert(day.id.clone(), day.clone());
    }
    Ok(())
}

pub(super) fn save_items(docs: &mut Documents, items: &[Item]) -> Result<(), PersistenceError> {
    ensure_trips(docs, items.iter().map(|i| &i.trip_id))?;
    for item in items {
        document(docs, &item.trip_id)?
            .items
            .insert(item.id.clone(), item.clone());
    }
    Ok(())
}

pub(super) fn save_links(docs: &mut Documents, links: &[Link]) -> Result<(), PersistenceError> {
    ensure_trips(docs, links.iter().map(|l| &l.trip_id))?;
    for link in links {
        document(docs, &link.trip_id)?
            .links
            .insert(link.id.clone(), link.clone());
    }
    Ok(())
}

pub(super) fn reorder(docs: &mut Documents, day_id: &DayId, ordered_ids: &[ItemId]) -> Result<(), PersistenceError> {
    let day = docs
        .values_mut()
        .find_map(|doc| doc.days.get_mut(day_id))
        .ok_or_else(|| PersistenceError::UnknownDay(day_id.clone()))?;

    let stored: HashSet<&ItemId> = day.item_ids.iter().collect();
    let proposed: HashSet<&ItemId> = ordered_ids.iter().collect();
    if ordered_ids.len() != day.item_ids.len() || stored != proposed {
        return Err(PersistenceError::ReorderMismatch(day_id.clone()));
    }
    day.item_ids = ordered_ids.to_vec();
    Ok(())
}

pub(super) fn delete_days(docs: &mut Documents, ids: &[DayId]) {
    for doc in docs.values_mut() {
        for id in ids {
            doc.days.remove(id);
        }
    }
}

pub(super) fn delete_items(docs: &mut Documents, ids: &[ItemId]) {
    for doc in docs.values_mut() {
        for id in ids {
            doc.items.remove(id);
        }
    }
}

pub(super) fn delete_links(docs: &mut Documents, ids: &[LinkId]) {
    for doc in docs.values_mut() {
        for id in ids {
            doc.links.remove(id);
        }
    }
}
