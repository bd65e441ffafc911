//! The trip graph snapshot and its selectors.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{
    Day, DayId, GraphError, Item, ItemId, Link, LinkId, TimelineBlock, Trip, TripId,
};

/// One trip with everything it owns, as exchanged with persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub trip: Trip,
    pub days: Vec<Day>,
    pub items: Vec<Item>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// An immutable view of the whole graph.
///
/// Cloning a graph is how snapshots are taken; two graphs compare equal
/// exactly when every observable field matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripGraph {
    pub(super) trips: BTreeMap<TripId, Trip>,
    pub(super) days: BTreeMap<DayId, Day>,
    pub(super) items: BTreeMap<ItemId, Item>,
    pub(super) links: BTreeMap<LinkId, Link>,
    /// Counter behind generated identifiers.
    pub(super) next_id: u64,
}

impl TripGraph {
    pub fn trip(&self, id: &TripId) -> Option<&Trip> {
        self.trips.get(id)
    }

    pub fn day(&self, id: &DayId) -> Option<&Day> {
        self.days.get(id)
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn trips(&self) -> impl Iterator<Item = &Trip> {
        self.trips.values()
    }

    /// Number of (trips, days, items, links).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.trips.len(),
            self.days.len(),
            self.items.len(),
            self.links.len(),
        )
    }

    /// A trip's days in display order.
    pub fn days_of_trip(&self, trip_id: &TripId) -> Vec<&Day> {
        let mut days: Vec<&Day> = self
            .days
            .values()
            .filter(|day| &day.trip_id == trip_id)
            .collect();
        days.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        days
    }

    /// A day's items in their authoritative order.
    pub fn items_of_day(&self, day_id: &DayId) -> Vec<&Item> {
        self.days
            .get(day_id)
            .map(|day| day.item_ids.iter().filter_map(|id| self.items.get(id)).collect())
            .unwrap_or_default()
    }

    /// A day's move blocks sorted by order.
    pub fn links_of_day(&self, day_id: &DayId) -> Vec<&Link> {
        let mut links: Vec<&Link> = self
            .links
            .values()
            .filter(|link| &link.day_id == day_id)
            .collect();
        links.sort_by(|a, b| a.order.total_cmp(&b.order));
        links
    }

    /// Links with the item at either end.
    pub fn links_of_item(&self, item_id: &ItemId) -> Vec<&Link> {
        self.links
            .values()
            .filter(|link| &link.from_item_id == item_id || &link.to_item_id == item_id)
            .collect()
    }

    /// Flat order of an item: its index within its day.
    pub fn item_order(&self, item_id: &ItemId) -> Option<usize> {
        let item = self.items.get(item_id)?;
        self.days.get(&item.day_id)?.position(item_id)
    }

    /// The day's stops and moves interleaved by order.
    pub fn timeline_of_day(&self, day_id: &DayId) -> Vec<TimelineBlock<'_>> {
        let mut blocks: Vec<TimelineBlock<'_>> = self
            .items_of_day(day_id)
            .into_iter()
            .enumerate()
            .map(|(idx, item)| TimelineBlock::Stop {
                item,
                order: idx as f64,
            })
            .chain(
                self.links_of_day(day_id)
                    .into_iter()
                    .map(|link| TimelineBlock::Move { link }),
            )
            .collect();
        blocks.sort_by(|a, b| a.order().total_cmp(&b.order()));
        blocks
    }

    /// Everything one trip owns, with days in display order and items in
    /// visiting order.
    pub fn record(&self, trip_id: &TripId) -> Option<TripRecord> {
        let trip = self.trips.get(trip_id)?.clone();
        let days: Vec<Day> = self.days_of_trip(trip_id).into_iter().cloned().collect();
        let items: Vec<Item> = days
            .iter()
            .flat_map(|day| self.items_of_day(&day.id))
            .cloned()
            .collect();
        let links: Vec<Link> = days
            .iter()
            .flat_map(|day| self.links_of_day(&day.id))
            .cloned()
            .collect();
        Some(TripRecord {
            trip,
            days,
            items,
            links,
        })
    }

    /// Equal in everything but links.
    pub fn same_content(&self, other: &TripGraph) -> bool {
        self.trips == other.trips
            && self.days == other.days
            && self.items == other.items
            && self.next_id == other.next_id
    }

    /// Verify the structural invariants of the graph.
    ///
    /// - every day belongs to an existing trip
    /// - every item is listed exactly once, by the day it names, of its trip
    /// - every link joins two adjacent items of its day, ordered between them
    pub fn check_integrity(&self) -> Result<(), GraphError> {
        for day in self.days.values() {
            if !self.trips.contains_key(&day.trip_id) {
                return Err(GraphError::Inconsistent(format!(
                    "day {} names missing trip {}",
                    day.id, day.trip_id
                )));
            }
            let mut seen = HashSet::new();
            for item_id in &day.item_ids {
                if !seen.insert(item_id) {
                    return Err(GraphError::Inconsistent(format!(
                        "day {} lists item {item_id} twice",
                        day.id
                    )));
                }
                match self.items.get(item_id) {
                    Some(item) if item.day_id == day.id => {}
                    Some(item) => {
                        return Err(GraphError::Inconsistent(format!(
                            "day {} lists item {item_id} belonging to day {}",
                            day.id, item.day_id
                        )));
                    }
                    None => {
                        return Err(GraphError::Inconsistent(format!(
                            "day {} lists missing item {item_id}",
                            day.id
                        )));
                    }
                }
            }
        }

        for item in self.items.values() {
            let Some(day) = self.days.get(&item.day_id) else {
                return Err(GraphError::Inconsistent(format!(
                    "item {} names missing day {}",
                    item.id, item.day_id
                )));
            };
            if day.trip_id != item.trip_id {
                return Err(GraphError::Inconsistent(format!(
                    "item {} is in trip {} but its day is in trip {}",
                    item.id, item.trip_id, day.trip_id
                )));
            }
            if day.position(&item.id).is_none() {
                return Err(GraphError::Inconsistent(format!(
                    "item {} is not listed by day {}",
                    item.id, day.id
                )));
            }
        }

        for link in self.links.values() {
            let day = self.days.get(&link.day_id).ok_or_else(|| {
                GraphError::Inconsistent(format!(
                    "link {} names missing day {}",
                    link.id, link.day_id
                ))
            })?;
            let from = day.position(&link.from_item_id);
            let to = day.position(&link.to_item_id);
            match (from, to) {
                (Some(from), Some(to)) if to == from + 1 => {
                    if !(link.order > from as f64 && link.order < to as f64) {
                        return Err(GraphError::Inconsistent(format!(
                            "link {} order {} not between {from} and {to}",
                            link.id, link.order
                        )));
                    }
                }
                _ => {
                    return Err(GraphError::Inconsistent(format!(
                        "link {} does not join adjacent items of day {}",
                        link.id, day.id
                    )));
                }
            }
        }

        Ok(())
    }
}
