//! The planner facade.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::broadcast;
use tracing::debug;

use crate::calendar::{self, CalendarExport};
use crate::domain::{
    Coordinate, DayId, GraphError, ItemId, ItemPatch, LinkId, NewItem, NewTrip, RoutePoint,
    TransportMode, TripId,
};
use crate::geocode::Geocoder;
use crate::history::{History, Snapshotting, Transition, UndoEvent, UndoToken, UndoWindows};
use crate::optimizer::{OptimizeOptions, RouteOrder, optimize};
use crate::persistence::TripRepository;
use crate::store::{Cascade, TripGraph, TripStore};
use crate::timeline::{
    Draft, Estimator, Synthesis, SynthesisError, SynthesisPlan, Synthesizer, needs_synthesis,
};

use super::{PlannerConfig, PlannerError};

/// Result of geocoding one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeocodeOutcome {
    /// The coordinate was written to the item.
    Located(Coordinate),
    /// No address, or the geocoder found nothing. The item is unchanged.
    Unresolved,
    /// The item was deleted or its address edited while the lookup ran.
    Superseded,
}

/// Owns the trip graph and every way of changing it.
#[derive(Debug)]
pub struct TripPlanner {
    store: TripStore,
    history: History<TripStore>,
    windows: UndoWindows<TripGraph>,
    /// Signature and links of each day's last synthesis.
    synthesized: HashMap<DayId, (String, Vec<LinkId>)>,
    config: PlannerConfig,
}

impl Default for TripPlanner {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

impl TripPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self::with_store(TripStore::new(), config)
    }

    /// Start from an existing store. Its current state cannot be undone.
    pub fn with_store(store: TripStore, config: PlannerConfig) -> Self {
        Self {
            store,
            history: History::new(config.history_depth),
            windows: UndoWindows::new(config.undo_window()),
            synthesized: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// The committed graph, for selectors.
    pub fn graph(&self) -> &TripGraph {
        self.store.graph()
    }

    // ========================================================================
    // Recorded mutations
    // ========================================================================

    pub fn create_trip(&mut self, new: NewTrip) -> TripId {
        let result = self
            .history
            .record(&mut self.store, "create trip", |s| Ok::<_, Infallible>(s.create_trip(new)));
        match result {
            Ok(id) => id,
            Err(never) => match never {},
        }
    }

    pub fn add_day(&mut self, trip_id: &TripId, date: NaiveDate) -> Result<DayId, PlannerError> {
        Ok(self
            .history
            .record(&mut self.store, "add day", |s| s.add_day(trip_id, date))?)
    }

    pub fn add_item(&mut self, day_id: &DayId, item: NewItem) -> Result<ItemId, PlannerError> {
        Ok(self
            .history
            .record(&mut self.store, "add item", |s| s.add_item(day_id, item))?)
    }

    pub fn update_item(&mut self, item_id: &ItemId, patch: ItemPatch) -> Result<(), PlannerError> {
        Ok(self
            .history
            .record(&mut self.store, "edit item", |s| s.update_item(item_id, patch))?)
    }

    pub fn move_item_to_day(
        &mut self,
        item_id: &ItemId,
        target_day_id: &DayId,
        target_index: usize,
    ) -> Result<usize, PlannerError> {
        Ok(self.history.record(&mut self.store, "move item", |s| {
            s.move_item_to_day(item_id, target_day_id, target_index)
        })?)
    }

    pub fn reorder_day(
        &mut self,
        day_id: &DayId,
        from_index: usize,
        to_index: usize,
    ) -> Result<usize, PlannerError> {
        Ok(self.history.record(&mut self.store, "reorder day", |s| {
            s.reorder_day(day_id, from_index, to_index)
        })?)
    }

    pub fn delete_item(&mut self, item_id: &ItemId) -> Result<Cascade, PlannerError> {
        Ok(self
            .history
            .record(&mut self.store, "delete item", |s| s.delete_item(item_id))?)
    }

    pub fn delete_day(&mut self, day_id: &DayId) -> Result<Cascade, PlannerError> {
        Ok(self
            .history
            .record(&mut self.store, "delete day", |s| s.delete_day(day_id))?)
    }

    pub fn delete_trip(&mut self, trip_id: &TripId) -> Result<Cascade, PlannerError> {
        Ok(self
            .history
            .record(&mut self.store, "delete trip", |s| s.delete_trip(trip_id))?)
    }

    pub fn set_default_mode(&mut self, trip_id: &TripId, mode: TransportMode) -> Result<(), PlannerError> {
        Ok(self
            .history
            .record(&mut self.store, "change transport mode", |s| {
                s.set_default_mode(trip_id, mode)
            })?)
    }

    // ========================================================================
    // Undo / redo
    // ========================================================================

    /// Revert the latest change. Returns its label.
    pub fn undo(&mut self) -> Option<String> {
        let label = self.history.undo(&mut self.store)?;
        debug!(%label, "undo");
        Some(label)
    }

    /// Re-apply the latest undone change. Returns its label.
    pub fn redo(&mut self) -> Option<String> {
        let label = self.history.redo(&mut self.store)?;
        debug!(%label, "redo");
        Some(label)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Delete a day now, keeping it revocable for the undo window.
    ///
    /// The deletion is also an ordinary undoable change.
    pub fn schedule_delete_day(&mut self, day_id: &DayId) -> Result<(UndoToken, Cascade), PlannerError> {
        let prev = self.store.snapshot();
        let (token, cascade) = self
            .windows
            .schedule(&mut self.store, "delete day", |s| s.delete_day(day_id))?;
        self.history.push(Transition {
            label: "delete day".to_string(),
            prev,
            next: self.store.snapshot(),
        });
        Ok((token, cascade))
    }

    /// Take back a scheduled change while its window is open.
    pub fn cancel_undo(&mut self, token: UndoToken) -> Result<(), PlannerError> {
        let discarded = self.windows.cancel(token, &mut self.store)?;
        // Already reverted; plain undo must not revert it again.
        self.history.retract(&discarded);
        Ok(())
    }

    /// Close every elapsed undo window. Scheduling a new one does this too.
    pub fn commit_expired_undos(&mut self) -> Vec<UndoToken> {
        self.windows.commit_expired()
    }

    /// Undo windows not yet committed, elapsed or not.
    pub fn open_undo_windows(&self) -> usize {
        self.windows.open_count()
    }

    /// Lifecycle events of undo windows.
    pub fn subscribe_undo(&self) -> broadcast::Receiver<UndoEvent> {
        self.windows.subscribe()
    }

    // ========================================================================
    // Route optimization
    // ========================================================================

    /// Reorder a day's located items for the shortest route in `mode`
    /// (the trip's default mode if `None`).
    pub fn optimize_day(&mut self, day_id: &DayId, mode: Option<TransportMode>) -> Result<RouteOrder, PlannerError> {
        let trip_mode = self.trip_of_day(day_id)?;
        let opts = self.config.optimize_options(mode.unwrap_or(trip_mode));
        self.optimize_day_with(day_id, &opts)
    }

    /// Reorder a day's located items with explicit options.
    ///
    /// Items without a coordinate keep their slots; located items are
    /// permuted among the remaining slots. The returned order indexes the
    /// located items only.
    pub fn optimize_day_with(&mut self, day_id: &DayId, opts: &OptimizeOptions) -> Result<RouteOrder, PlannerError> {
        let graph = self.store.graph();
        if graph.day(day_id).is_none() {
            return Err(GraphError::DayNotFound(day_id.clone()).into());
        }
        let items = graph.items_of_day(day_id);
        let located: Vec<(usize, RoutePoint)> = items
            .iter()
            .enumerate()
            .filter_map(|(slot, item)| {
                item.coordinate.map(|coordinate| {
                    (
                        slot,
                        RoutePoint {
                            coordinate,
                            rating: item.rating,
                        },
                    )
                })
            })
            .collect();
        let points: Vec<RoutePoint> = located.iter().map(|(_, p)| *p).collect();

        let route = optimize(&points, opts)?;
        debug!(day = %day_id, outcome = %route.outcome, "day optimized");
        if route.is_identity() {
            return Ok(route);
        }

        let mut ordered: Vec<ItemId> = items.iter().map(|item| item.id.clone()).collect();
        for (k, &source) in route.order.iter().enumerate() {
            ordered[located[k].0] = items[located[source].0].id.clone();
        }
        self.history
            .record(&mut self.store, "optimize day", |s| s.set_day_order(day_id, ordered))?;
        Ok(route)
    }

    fn trip_of_day(&self, day_id: &DayId) -> Result<TransportMode, GraphError> {
        let graph = self.store.graph();
        let day = graph
            .day(day_id)
            .ok_or_else(|| GraphError::DayNotFound(day_id.clone()))?;
        graph
            .trip(&day.trip_id)
            .map(|trip| trip.default_mode)
            .ok_or_else(|| GraphError::TripNotFound(day.trip_id.clone()))
    }

    // ========================================================================
    // Timeline synthesis
    // ========================================================================

    fn synthesizer(&self) -> Synthesizer {
        Synthesizer::new(self.config.estimate_batch_size)
    }

    /// Whether the day changed since it was last synthesized, or an undo
    /// put back other links than the ones synthesized.
    pub fn needs_synthesis(&self, day_id: &DayId) -> bool {
        let last = self.synthesized.get(day_id);
        if needs_synthesis(
            self.store.graph(),
            day_id,
            last.map(|(signature, _)| signature.as_str()),
        ) {
            return true;
        }
        let current: Vec<&LinkId> = self
            .store
            .graph()
            .links_of_day(day_id)
            .into_iter()
            .map(|link| &link.id)
            .collect();
        last.is_some_and(|(_, links)| !links.iter().eq(current))
    }

    /// First phase of synthesis, for callers that estimate elsewhere.
    pub fn plan_synthesis(&self, day_id: &DayId) -> Result<SynthesisPlan, PlannerError> {
        Ok(self.synthesizer().plan(self.store.graph(), day_id)?)
    }

    /// Last phase of synthesis. Fails with a stale error if the day changed
    /// since the draft was planned.
    pub fn commit_synthesis(&mut self, draft: Draft) -> Result<Synthesis, PlannerError> {
        let synthesis = self.synthesizer().commit(&mut self.store, draft)?;
        self.synthesized.insert(
            synthesis.day_id.clone(),
            (synthesis.signature.clone(), synthesis.links.clone()),
        );
        Ok(synthesis)
    }

    /// Rebuild a day's move blocks.
    ///
    /// Links are derived data, so this is not an undoable change.
    pub async fn synthesize_day<E: Estimator>(
        &mut self,
        day_id: &DayId,
        estimator: &E,
    ) -> Result<Synthesis, PlannerError> {
        let plan = self.plan_synthesis(day_id)?;
        let draft = self.synthesizer().estimate(plan, estimator).await;
        self.commit_synthesis(draft)
    }

    /// Synthesize a day only if its stops changed since last time.
    pub async fn refresh_day<E: Estimator>(
        &mut self,
        day_id: &DayId,
        estimator: &E,
    ) -> Result<Option<Synthesis>, PlannerError> {
        if !self.needs_synthesis(day_id) {
            return Ok(None);
        }
        match self.synthesize_day(day_id, estimator).await {
            Ok(synthesis) => Ok(Some(synthesis)),
            Err(PlannerError::Synthesis(SynthesisError::Stale(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Geocoding
    // ========================================================================

    /// Look up an item's address and store the coordinate.
    pub async fn geocode_item<G: Geocoder>(
        &mut self,
        item_id: &ItemId,
        geocoder: &G,
    ) -> Result<GeocodeOutcome, PlannerError> {
        let Some(address) = self.geocode_request(item_id)? else {
            return Ok(GeocodeOutcome::Unresolved);
        };
        let found = geocoder.forward(&address).await;
        self.apply_geocode(item_id, &address, found)
    }

    /// The address to look up for an item, if it has one.
    pub fn geocode_request(&self, item_id: &ItemId) -> Result<Option<String>, PlannerError> {
        let item = self
            .store
            .graph()
            .item(item_id)
            .ok_or_else(|| GraphError::ItemNotFound(item_id.clone()))?;
        Ok(item.address.clone().filter(|a| !a.trim().is_empty()))
    }

    /// Store a lookup result if the item still has the address looked up.
    pub fn apply_geocode(
        &mut self,
        item_id: &ItemId,
        address: &str,
        found: Option<Coordinate>,
    ) -> Result<GeocodeOutcome, PlannerError> {
        let current = self.store.graph().item(item_id);
        if current.and_then(|item| item.address.as_deref()) != Some(address) {
            debug!(item = %item_id, "geocode result superseded");
            return Ok(GeocodeOutcome::Superseded);
        }
        let Some(coordinate) = found else {
            debug!(item = %item_id, %address, "address not found");
            return Ok(GeocodeOutcome::Unresolved);
        };

        self.history.record(&mut self.store, "locate item", |s| {
            s.update_item(
                item_id,
                ItemPatch {
                    coordinate: Some(Some(coordinate)),
                    ..ItemPatch::default()
                },
            )
        })?;
        Ok(GeocodeOutcome::Located(coordinate))
    }

    // ========================================================================
    // Calendar export
    // ========================================================================

    pub fn export_day_ics(&self, day_id: &DayId, generated_at: DateTime<Utc>) -> Result<CalendarExport, PlannerError> {
        Ok(calendar::export_day(self.store.graph(), day_id, generated_at)?)
    }

    pub fn export_trip_ics(&self, trip_id: &TripId, generated_at: DateTime<Utc>) -> Result<CalendarExport, PlannerError> {
        Ok(calendar::export_trip(self.store.graph(), trip_id, generated_at)?)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Replace the local copy of a trip with the stored one.
    ///
    /// Returns `false` if the repository has no such trip. Loading is an
    /// undoable change.
    pub async fn load_trip<R: TripRepository>(&mut self, trip_id: &TripId, repo: &R) -> Result<bool, PlannerError> {
        let Some(record) = repo.load_trip_graph(trip_id).await? else {
            return Ok(false);
        };
        self.history
            .record(&mut self.store, "load trip", |s| s.import(record))?;
        self.synthesized.retain(|day_id, _| self.store.graph().day(day_id).is_some());
        Ok(true)
    }

    /// Mirror a trip into the repository.
    ///
    /// Upserts everything the trip owns and deletes what the repository has
    /// but the trip no longer does. A trip deleted locally is deleted from
    /// the repository.
    pub async fn sync_trip<R: TripRepository>(&self, trip_id: &TripId, repo: &R) -> Result<(), PlannerError> {
        let Some(record) = self.store.graph().record(trip_id) else {
            repo.delete_trip(trip_id).await?;
            debug!(trip = %trip_id, "trip removed from repository");
            return Ok(());
        };

        if let Some(stored) = repo.load_trip_graph(trip_id).await? {
            let days: HashSet<_> = record.days.iter().map(|d| &d.id).collect();
            let items: HashSet<_> = record.items.iter().map(|i| &i.id).collect();
            let links: HashSet<_> = record.links.iter().map(|l| &l.id).collect();

            let gone_links: Vec<_> = stored
                .links
                .iter()
                .map(|l| l.id.clone())
                .filter(|id| !links.contains(id))
                .collect();
            let gone_items: Vec<_> = stored
                .items
                .iter()
                .map(|i| i.id.clone())
                .filter(|id| !items.contains(id))
                .collect();
            let gone_days: Vec<_> = stored
                .days
                .iter()
                .map(|d| d.id.clone())
                .filter(|id| !days.contains(id))
                .collect();
            repo.delete_links(&gone_links).await?;
            repo.delete_items(&gone_items).await?;
            repo.delete_days(&gone_days).await?;
        }

        repo.save_trip(&record.trip).await?;
        repo.save_days(&record.days).await?;
        repo.save_items(&record.items).await?;
        repo.save_links(&record.links).await?;
        debug!(
            trip = %trip_id,
            days = record.days.len(),
            items = record.items.len(),
            links = record.links.len(),
            "trip synced"
        );
        Ok(())
    }

    /// Push one day's item order to the repository in a single write.
    pub async fn sync_day_order<R: TripRepository>(&self, day_id: &DayId, repo: &R) -> Result<(), PlannerError> {
        let day = self
            .store
            .graph()
            .day(day_id)
            .ok_or_else(|| GraphError::DayNotFound(day_id.clone()))?;
        repo.reorder(day_id, &day.item_ids).await?;
        Ok(())
    }
}
