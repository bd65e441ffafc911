//! Mutations over the trip graph.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, trace};

use crate::domain::{
    Day, DayId, GraphError, Item, ItemId, ItemPatch, Link, LinkId, NewItem, NewTrip,
    TransportMode, Trip, TripId,
};
use crate::history::Snapshotting;

use super::graph::{TripGraph, TripRecord};

/// Everything a cascading delete removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cascade {
    pub days: Vec<DayId>,
    pub items: Vec<ItemId>,
    pub links: Vec<LinkId>,
}

/// The single source of truth for trip content.
///
/// All mutations take `&mut self`, so they are serialized by construction:
/// the last committed call wins and every selector reads committed state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripStore {
    graph: TripGraph,
}

impl TripStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing snapshot.
    pub fn from_graph(graph: TripGraph) -> Self {
        Self { graph }
    }

    /// The current snapshot.
    pub fn graph(&self) -> &TripGraph {
        &self.graph
    }

    /// Advance the id counter until `taken` rejects the candidate.
    fn allocate(&mut self, taken: impl Fn(&TripGraph, u64) -> bool) -> u64 {
        loop {
            self.graph.next_id += 1;
            if !taken(&self.graph, self.graph.next_id) {
                return self.graph.next_id;
            }
        }
    }

    fn trip_exists(&self, id: &TripId) -> Result<(), GraphError> {
        if self.graph.trips.contains_key(id) {
            Ok(())
        } else {
            Err(GraphError::TripNotFound(id.clone()))
        }
    }

    fn day_ref(&self, id: &DayId) -> Result<&Day, GraphError> {
        self.graph
            .days
            .get(id)
            .ok_or_else(|| GraphError::DayNotFound(id.clone()))
    }

    fn day_mut(&mut self, id: &DayId) -> Result<&mut Day, GraphError> {
        self.graph
            .days
            .get_mut(id)
            .ok_or_else(|| GraphError::DayNotFound(id.clone()))
    }

    fn item_ref(&self, id: &ItemId) -> Result<&Item, GraphError> {
        self.graph
            .items
            .get(id)
            .ok_or_else(|| GraphError::ItemNotFound(id.clone()))
    }

    /// Create an empty trip.
    pub fn create_trip(&mut self, new: NewTrip) -> TripId {
        let n = self.allocate(|g, n| g.trips.contains_key(&TripId::generated("trip", n)));
        let id = TripId::generated("trip", n);
        let trip = Trip {
            id: id.clone(),
            title: new.title,
            start_date: new.start_date,
            nights: new.nights,
            currency: new.currency,
            default_mode: new.default_mode,
            timezone: new.timezone,
        };
        debug!(trip = %id, "trip created");
        self.graph.trips.insert(id.clone(), trip);
        id
    }

    /// Append a day to a trip.
    pub fn add_day(&mut self, trip_id: &TripId, date: NaiveDate) -> Result<DayId, GraphError> {
        self.trip_exists(trip_id)?;

        let order = self.graph.days_of_trip(trip_id).len() as u32;
        let n = self.allocate(|g, n| g.days.contains_key(&DayId::generated("day", n)));
        let id = DayId::generated("day", n);
        self.graph.days.insert(
            id.clone(),
            Day {
                id: id.clone(),
                trip_id: trip_id.clone(),
                date,
                item_ids: Vec::new(),
                order,
            },
        );
        debug!(trip = %trip_id, day = %id, %date, "day added");
        Ok(id)
    }

    /// Append an item to the end of a day.
    pub fn add_item(&mut self, day_id: &DayId, new: NewItem) -> Result<ItemId, GraphError> {
        let trip_id = self.day_ref(day_id)?.trip_id.clone();

        let n = self.allocate(|g, n| g.items.contains_key(&ItemId::generated("item", n)));
        let id = ItemId::generated("item", n);
        let item = new.into_item(id.clone(), trip_id, day_id.clone());
        self.graph.items.insert(id.clone(), item);
        if let Some(day) = self.graph.days.get_mut(day_id) {
            day.item_ids.push(id.clone());
        }
        // The previous last item now has a successor; its links stay valid.
        debug!(day = %day_id, item = %id, "item added");
        Ok(id)
    }

    /// Apply a partial update to an item.
    ///
    /// Moving an item's coordinate invalidates the move blocks touching it.
    pub fn update_item(&mut self, item_id: &ItemId, patch: ItemPatch) -> Result<(), GraphError> {
        self.item_ref(item_id)?;

        let moved = match self.graph.items.get_mut(item_id) {
            Some(item) => patch.apply(item),
            None => false,
        };
        if moved {
            let stale: Vec<LinkId> = self
                .graph
                .links_of_item(item_id)
                .into_iter()
                .map(|link| link.id.clone())
                .collect();
            for id in &stale {
                self.graph.links.remove(id);
            }
            trace!(item = %item_id, dropped = stale.len(), "coordinate changed");
        }
        Ok(())
    }

    /// Move an item to `target_index` of another (or the same) day.
    ///
    /// The index is clamped to the target day's length. Returns the index
    /// the item ended up at.
    pub fn move_item_to_day(
        &mut self,
        item_id: &ItemId,
        target_day_id: &DayId,
        target_index: usize,
    ) -> Result<usize, GraphError> {
        let item = self.item_ref(item_id)?;
        let source_day_id = item.day_id.clone();
        let item_trip = item.trip_id.clone();
        let target_trip = self.day_ref(target_day_id)?.trip_id.clone();
        if item_trip != target_trip {
            return Err(GraphError::CrossTripMove {
                item: item_id.clone(),
                day: target_day_id.clone(),
            });
        }

        if let Some(source) = self.graph.days.get_mut(&source_day_id) {
            source.item_ids.retain(|id| id != item_id);
        }
        let target = self.day_mut(target_day_id)?;
        let index = target_index.min(target.item_ids.len());
        target.item_ids.insert(index, item_id.clone());
        if let Some(item) = self.graph.items.get_mut(item_id) {
            item.day_id = target_day_id.clone();
        }

        self.prune_links(&source_day_id);
        if &source_day_id != target_day_id {
            self.prune_links(target_day_id);
        }
        debug!(item = %item_id, from = %source_day_id, to = %target_day_id, index, "item moved");
        Ok(index)
    }

    /// Move the item at `from_index` to `to_index` within a day.
    ///
    /// `to_index` is clamped; an out-of-range `from_index` is an error.
    /// Returns the index the item ended up at.
    pub fn reorder_day(
        &mut self,
        day_id: &DayId,
        from_index: usize,
        to_index: usize,
    ) -> Result<usize, GraphError> {
        let len = self.day_ref(day_id)?.item_ids.len();
        if from_index >= len {
            return Err(GraphError::IndexOutOfRange {
                day: day_id.clone(),
                index: from_index,
                len,
            });
        }

        let day = self.day_mut(day_id)?;
        let moved = day.item_ids.remove(from_index);
        let index = to_index.min(day.item_ids.len());
        day.item_ids.insert(index, moved);
        self.prune_links(day_id);
        debug!(day = %day_id, from_index, to_index = index, "day reordered");
        Ok(index)
    }

    /// Replace a day's item order with a permutation of its current items.
    pub fn set_day_order(&mut self, day_id: &DayId, ordered: Vec<ItemId>) -> Result<(), GraphError> {
        let day = self.day_ref(day_id)?;
        let current: HashSet<&ItemId> = day.item_ids.iter().collect();
        let proposed: HashSet<&ItemId> = ordered.iter().collect();
        if ordered.len() != day.item_ids.len() || current != proposed {
            return Err(GraphError::Inconsistent(format!(
                "new order for day {day_id} is not a permutation of its items"
            )));
        }

        if let Some(day) = self.graph.days.get_mut(day_id) {
            day.item_ids = ordered;
        }
        self.prune_links(day_id);
        Ok(())
    }

    /// Remove one item and the move blocks touching it.
    pub fn delete_item(&mut self, item_id: &ItemId) -> Result<Cascade, GraphError> {
        let day_id = self.item_ref(item_id)?.day_id.clone();

        self.graph.items.remove(item_id);
        if let Some(day) = self.graph.days.get_mut(&day_id) {
            day.item_ids.retain(|id| id != item_id);
        }
        let mut cascade = Cascade {
            items: vec![item_id.clone()],
            ..Cascade::default()
        };
        cascade.links = self.remove_links(|link| {
            &link.from_item_id == item_id || &link.to_item_id == item_id
        });
        cascade.links.extend(self.prune_links(&day_id));
        debug!(item = %item_id, links = cascade.links.len(), "item deleted");
        Ok(cascade)
    }

    /// Remove a day, its items and every link touching them.
    pub fn delete_day(&mut self, day_id: &DayId) -> Result<Cascade, GraphError> {
        let trip_id = self.day_ref(day_id)?.trip_id.clone();

        let mut cascade = self.remove_days(|day| &day.id == day_id);
        self.renumber_days(&trip_id);
        cascade.links.sort();
        debug!(
            day = %day_id,
            items = cascade.items.len(),
            links = cascade.links.len(),
            "day deleted"
        );
        Ok(cascade)
    }

    /// Remove a trip and everything it owns.
    pub fn delete_trip(&mut self, trip_id: &TripId) -> Result<Cascade, GraphError> {
        self.trip_exists(trip_id)?;

        let mut cascade = self.remove_days(|day| &day.trip_id == trip_id);
        // Items or links left behind by a malformed import still go.
        let orphan_items: Vec<ItemId> = self
            .graph
            .items
            .values()
            .filter(|item| &item.trip_id == trip_id)
            .map(|item| item.id.clone())
            .collect();
        for id in &orphan_items {
            self.graph.items.remove(id);
        }
        cascade.items.extend(orphan_items);
        cascade.links.extend(self.remove_links(|link| &link.trip_id == trip_id));
        cascade.links.sort();
        self.graph.trips.remove(trip_id);

        debug!(
            trip = %trip_id,
            days = cascade.days.len(),
            items = cascade.items.len(),
            "trip deleted"
        );
        Ok(cascade)
    }

    /// Change the transport mode used for a trip's move blocks.
    pub fn set_default_mode(&mut self, trip_id: &TripId, mode: TransportMode) -> Result<(), GraphError> {
        match self.graph.trips.get_mut(trip_id) {
            Some(trip) => {
                trip.default_mode = mode;
                Ok(())
            }
            None => Err(GraphError::TripNotFound(trip_id.clone())),
        }
    }

    /// Replace all move blocks of a day.
    ///
    /// Every link must join two adjacent items of the day and sit strictly
    /// between them; otherwise nothing is replaced.
    pub fn replace_day_links(&mut self, day_id: &DayId, links: Vec<Link>) -> Result<(), GraphError> {
        let day = self.day_ref(day_id)?;
        for link in &links {
            let from = day.position(&link.from_item_id);
            let to = day.position(&link.to_item_id);
            let adjacent = matches!((from, to), (Some(f), Some(t)) if t == f + 1);
            let between = from.is_some_and(|f| link.order > f as f64 && link.order < (f + 1) as f64);
            if &link.day_id != day_id || link.trip_id != day.trip_id || !adjacent || !between {
                return Err(GraphError::Inconsistent(format!(
                    "link {} does not fit day {day_id}",
                    link.id
                )));
            }
        }

        self.remove_links(|link| &link.day_id == day_id);
        for link in links {
            self.graph.links.insert(link.id.clone(), link);
        }
        Ok(())
    }

    /// Merge a persisted trip into the graph, replacing any local copy of it.
    ///
    /// The merged graph is checked before it is committed, so a malformed
    /// record leaves the store untouched.
    pub fn import(&mut self, record: TripRecord) -> Result<(), GraphError> {
        let trip_id = record.trip.id.clone();
        let mut next = self.clone();
        if next.graph.trips.contains_key(&trip_id) {
            next.delete_trip(&trip_id)?;
        }

        for day in &record.days {
            if day.trip_id != trip_id {
                return Err(GraphError::Inconsistent(format!(
                    "day {} belongs to trip {}, not {trip_id}",
                    day.id, day.trip_id
                )));
            }
            if next.graph.days.contains_key(&day.id) {
                return Err(GraphError::Inconsistent(format!(
                    "day {} already belongs to another trip",
                    day.id
                )));
            }
        }

        next.graph.trips.insert(trip_id.clone(), record.trip);
        for day in record.days {
            next.graph.days.insert(day.id.clone(), day);
        }
        for item in record.items {
            if next.graph.items.contains_key(&item.id) {
                return Err(GraphError::Inconsistent(format!(
                    "item {} already belongs to another trip",
                    item.id
                )));
            }
            next.graph.items.insert(item.id.clone(), item);
        }
        for link in record.links {
            next.graph.links.insert(link.id.clone(), link);
        }
        next.renumber_days(&trip_id);
        next.graph.check_integrity()?;

        *self = next;
        debug!(trip = %trip_id, "trip imported");
        Ok(())
    }

    /// Remove matching days plus their items and links.
    fn remove_days(&mut self, matches: impl Fn(&Day) -> bool) -> Cascade {
        let days: Vec<DayId> = self
            .graph
            .days
            .values()
            .filter(|day| matches(day))
            .map(|day| day.id.clone())
            .collect();
        let doomed: HashSet<&DayId> = days.iter().collect();

        // Match on the item's own day id, not only the day's list.
        let items: Vec<ItemId> = self
            .graph
            .items
            .values()
            .filter(|item| doomed.contains(&item.day_id))
            .map(|item| item.id.clone())
            .collect();
        let item_set: HashSet<&ItemId> = items.iter().collect();

        let links = {
            let mut ids = Vec::new();
            self.graph.links.retain(|id, link| {
                let keep = !doomed.contains(&link.day_id)
                    && !item_set.contains(&link.from_item_id)
                    && !item_set.contains(&link.to_item_id);
                if !keep {
                    ids.push(id.clone());
                }
                keep
            });
            ids
        };

        for id in &items {
            self.graph.items.remove(id);
        }
        for id in &days {
            self.graph.days.remove(id);
        }

        Cascade { days, items, links }
    }

    fn remove_links(&mut self, matches: impl Fn(&Link) -> bool) -> Vec<LinkId> {
        let mut removed = Vec::new();
        self.graph.links.retain(|id, link| {
            if matches(link) {
                removed.push(id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drop a day's links whose items are no longer adjacent, and re-centre
    /// the rest between their neighbours.
    fn prune_links(&mut self, day_id: &DayId) -> Vec<LinkId> {
        let Some(day) = self.graph.days.get(day_id) else {
            return self.remove_links(|link| &link.day_id == day_id);
        };
        let positions: Vec<(LinkId, Option<usize>)> = self
            .graph
            .links
            .values()
            .filter(|link| &link.day_id == day_id)
            .map(|link| {
                let from = day.position(&link.from_item_id);
                let to = day.position(&link.to_item_id);
                let adjacent = match (from, to) {
                    (Some(f), Some(t)) if t == f + 1 => Some(f),
                    _ => None,
                };
                (link.id.clone(), adjacent)
            })
            .collect();

        let mut removed = Vec::new();
        for (id, adjacent) in positions {
            match adjacent {
                Some(from) => {
                    if let Some(link) = self.graph.links.get_mut(&id) {
                        link.order = from as f64 + 0.5;
                    }
                }
                None => {
                    self.graph.links.remove(&id);
                    removed.push(id);
                }
            }
        }
        if !removed.is_empty() {
            trace!(day = %day_id, dropped = removed.len(), "stale links pruned");
        }
        removed
    }

    /// Renumber a trip's days to consecutive display orders.
    fn renumber_days(&mut self, trip_id: &TripId) {
        let ids: Vec<DayId> = self
            .graph
            .days_of_trip(trip_id)
            .into_iter()
            .map(|day| day.id.clone())
            .collect();
        for (order, id) in ids.iter().enumerate() {
            if let Some(day) = self.graph.days.get_mut(id) {
                day.order = order as u32;
            }
        }
    }
}

impl Snapshotting for TripStore {
    type Snapshot = TripGraph;

    fn snapshot(&self) -> TripGraph {
        self.graph.clone()
    }

    fn restore(&mut self, snapshot: TripGraph) {
        self.graph = snapshot;
    }

    /// Links are rebuilt from items, so link-only changes don't count.
    fn diverged(current: &TripGraph, expected: &TripGraph) -> bool {
        !current.same_content(expected)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::domain::ItemKind;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        AddDay,
        AddItem { day: usize },
        Move { item: usize, day: usize, index: usize },
        Reorder { day: usize, from: usize, to: usize },
        DeleteItem { item: usize },
        DeleteDay { day: usize },
        Link { day: usize, at: usize },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            1 => Just(Op::AddDay),
            3 => (0usize..6).prop_map(|day| Op::AddItem { day }),
            2 => (0usize..20, 0usize..6, 0usize..8)
                .prop_map(|(item, day, index)| Op::Move { item, day, index }),
            2 => (0usize..6, 0usize..8, 0usize..8)
                .prop_map(|(day, from, to)| Op::Reorder { day, from, to }),
            1 => (0usize..20).prop_map(|item| Op::DeleteItem { item }),
            1 => (0usize..6).prop_map(|day| Op::DeleteDay { day }),
            2 => (0usize..6, 0usize..8).prop_map(|(day, at)| Op::Link { day, at }),
        ]
    }

    fn pick<T: Clone>(values: Vec<T>, idx: usize) -> Option<T> {
        if values.is_empty() {
            None
        } else {
            Some(values[idx % values.len()].clone())
        }
    }

    /// Apply an op to whatever entities currently exist; errors are fine.
    fn apply(store: &mut TripStore, trip: &TripId, op: &Op) {
        let graph = store.graph();
        let days: Vec<DayId> = graph.days_of_trip(trip).iter().map(|d| d.id.clone()).collect();
        let items: Vec<ItemId> = graph.items.keys().cloned().collect();
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        match op {
            Op::AddDay => {
                let _ = store.add_day(trip, date);
            }
            Op::AddItem { day } => {
                if let Some(day) = pick(days, *day) {
                    let _ = store.add_item(&day, NewItem::new(ItemKind::Stop, "s"));
                }
            }
            Op::Move { item, day, index } => {
                if let (Some(item), Some(day)) = (pick(items, *item), pick(days, *day)) {
                    let _ = store.move_item_to_day(&item, &day, *index);
                }
            }
            Op::Reorder { day, from, to } => {
                if let Some(day) = pick(days, *day) {
                    let _ = store.reorder_day(&day, *from, *to);
                }
            }
            Op::DeleteItem { item } => {
                if let Some(item) = pick(items, *item) {
                    let _ = store.delete_item(&item);
                }
            }
            Op::DeleteDay { day } => {
                if let Some(day) = pick(days, *day) {
                    let _ = store.delete_day(&day);
                }
            }
            Op::Link { day, at } => {
                if let Some(day_id) = pick(days, *day) {
                    let ids = store.graph().day(&day_id).unwrap().item_ids.clone();
                    if ids.len() >= 2 {
                        let from = at % (ids.len() - 1);
                        let mut links: Vec<Link> =
                            store.graph().links_of_day(&day_id).into_iter().cloned().collect();
                        let new = Link {
                            id: LinkId::between(&ids[from], &ids[from + 1]),
                            trip_id: trip.clone(),
                            day_id: day_id.clone(),
                            from_item_id: ids[from].clone(),
                            to_item_id: ids[from + 1].clone(),
                            mode: TransportMode::Walking,
                            minutes: 5,
                            cost: 0.0,
                            order: from as f64 + 0.5,
                        };
                        links.retain(|l| l.id != new.id);
                        links.push(new);
                        store.replace_day_links(&day_id, links).unwrap();
                    }
                }
            }
        }
    }

    fn seeded() -> (TripStore, TripId) {
        let mut store = TripStore::new();
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let trip = store.create_trip(NewTrip::new("t", date, 2));
        for _ in 0..2 {
            store.add_day(&trip, date).unwrap();
        }
        (store, trip)
    }

    proptest! {
        #[test]
        fn integrity_survives_any_op_sequence(ops in prop::collection::vec(op_strategy(), 0..60)) {
            let (mut store, trip) = seeded();
            for op in &ops {
                apply(&mut store, &trip, op);
                prop_assert!(
                    store.graph().check_integrity().is_ok(),
                    "broken after {:?}: {:?}",
                    op,
                    store.graph().check_integrity()
                );
            }
        }

        #[test]
        fn delete_day_leaves_no_orphans(
            ops in prop::collection::vec(op_strategy(), 0..40),
            victim in 0usize..6,
        ) {
            let (mut store, trip) = seeded();
            for op in &ops {
                apply(&mut store, &trip, op);
            }
            let days: Vec<DayId> =
                store.graph().days_of_trip(&trip).iter().map(|d| d.id.clone()).collect();
            prop_assume!(!days.is_empty());
            let day = days[victim % days.len()].clone();
            let others: Vec<Day> = days
                .iter()
                .filter(|d| **d != day)
                .map(|d| store.graph().day(d).unwrap().clone())
                .collect();

            store.delete_day(&day).unwrap();
            let graph = store.graph();

            prop_assert!(graph.items.values().all(|item| item.day_id != day));
            let links_valid = graph.links.values().all(|link| {
                link.day_id != day
                    && graph.item(&link.from_item_id).is_some()
                    && graph.item(&link.to_item_id).is_some()
            });
            prop_assert!(links_valid);
            for other in others {
                let now = graph.day(&other.id).unwrap();
                prop_assert_eq!(&now.item_ids, &other.item_ids);
            }
        }
    }
}
