//! Expanding a day's stops into a timeline with move blocks.
//!
//! Synthesis runs in three phases so that no borrow of the store is held
//! across an await:
//!
//! 1. [`Synthesizer::plan`] reads the committed graph and lists the legs.
//! 2. [`Synthesizer::estimate`] asks the estimator about every leg.
//! 3. [`Synthesizer::commit`] re-checks the day and replaces its links.
//!
//! A day that changed while estimates were outstanding is rejected at
//! commit time with [`SynthesisError::Stale`].

use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::{
    Coordinate, DayId, GraphError, ItemId, Link, LinkId, TransportMode, TripId,
};
use crate::store::{TripGraph, TripStore};

use super::estimator::Estimator;

/// Estimates requested concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Why two adjacent stops have no move block between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapReason {
    /// One of the stops has no coordinate.
    MissingCoordinate,
    /// The estimator failed or had no answer.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gap {
    pub from_item_id: ItemId,
    pub to_item_id: ItemId,
    pub reason: GapReason,
}

/// A pair of adjacent located stops awaiting an estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    /// Position of `from` within the day.
    pub index: usize,
    pub from_item_id: ItemId,
    pub to_item_id: ItemId,
    pub origin: Coordinate,
    pub destination: Coordinate,
}

/// Output of the plan phase.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisPlan {
    pub trip_id: TripId,
    pub day_id: DayId,
    pub mode: TransportMode,
    pub signature: String,
    pub legs: Vec<Leg>,
    pub gaps: Vec<Gap>,
}

/// Output of the estimate phase: links ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub day_id: DayId,
    pub signature: String,
    pub links: Vec<Link>,
    pub gaps: Vec<Gap>,
}

/// Result of a committed synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub day_id: DayId,
    /// Signature of the day the links were built for.
    pub signature: String,
    pub links: Vec<LinkId>,
    pub gaps: Vec<Gap>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// The day changed between plan and commit
    #[error("day {0} changed while estimates were outstanding")]
    Stale(DayId),
}

/// Stable signature of a day's stop sequence.
///
/// The trip's default mode followed by each item id joined with its
/// coordinate, so a mode change, a reorder and a moved pin all change it.
/// Returns `None` if the day does not exist.
pub fn day_signature(graph: &TripGraph, day_id: &DayId) -> Option<String> {
    let day = graph.day(day_id)?;
    let mode = graph.trip(&day.trip_id)?.default_mode;
    let parts: Vec<String> = graph
        .items_of_day(day_id)
        .into_iter()
        .map(|item| match item.coordinate {
            Some(c) => format!("{}@{c}", item.id),
            None => format!("{}@-", item.id),
        })
        .collect();
    Some(format!("{mode}:{}", parts.join("|")))
}

/// Whether the day's stops differ from those last synthesized.
pub fn needs_synthesis(graph: &TripGraph, day_id: &DayId, last_signature: Option<&str>) -> bool {
    match (day_signature(graph, day_id), last_signature) {
        (Some(current), Some(last)) => current != last,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Builds move blocks between adjacent stops.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    batch_size: usize,
    mode: Option<TransportMode>,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl Synthesizer {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            mode: None,
        }
    }

    /// Use `mode` instead of the trip's default mode.
    pub fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// List the legs of a day. Pairs with a missing coordinate become gaps.
    pub fn plan(&self, graph: &TripGraph, day_id: &DayId) -> Result<SynthesisPlan, GraphError> {
        let day = graph
            .day(day_id)
            .ok_or_else(|| GraphError::DayNotFound(day_id.clone()))?;
        let trip = graph
            .trip(&day.trip_id)
            .ok_or_else(|| GraphError::TripNotFound(day.trip_id.clone()))?;
        let signature = day_signature(graph, day_id).unwrap_or_default();

        let items = graph.items_of_day(day_id);
        let mut legs = Vec::new();
        let mut gaps = Vec::new();
        for (index, pair) in items.windows(2).enumerate() {
            let (from, to) = (pair[0], pair[1]);
            match (from.coordinate, to.coordinate) {
                (Some(origin), Some(destination)) => legs.push(Leg {
                    index,
                    from_item_id: from.id.clone(),
                    to_item_id: to.id.clone(),
                    origin,
                    destination,
                }),
                _ => gaps.push(Gap {
                    from_item_id: from.id.clone(),
                    to_item_id: to.id.clone(),
                    reason: GapReason::MissingCoordinate,
                }),
            }
        }

        let mode = self.mode.unwrap_or(trip.default_mode);
        debug!(day = %day_id, %mode, legs = legs.len(), gaps = gaps.len(), "synthesis planned");
        Ok(SynthesisPlan {
            trip_id: trip.id.clone(),
            day_id: day_id.clone(),
            mode,
            signature,
            legs,
            gaps,
        })
    }

    /// Ask the estimator about every leg, `batch_size` requests at a time.
    ///
    /// Never fails: a leg without an answer becomes a [`GapReason::Unknown`]
    /// gap and the rest carry on.
    pub async fn estimate<E: Estimator>(&self, plan: SynthesisPlan, estimator: &E) -> Draft {
        let SynthesisPlan {
            trip_id,
            day_id,
            mode,
            signature,
            legs,
            mut gaps,
        } = plan;

        let mut links = Vec::with_capacity(legs.len());
        for batch in legs.chunks(self.batch_size) {
            let answers = join_all(
                batch
                    .iter()
                    .map(|leg| estimator.estimate(leg.origin, leg.destination, mode)),
            )
            .await;

            for (leg, answer) in batch.iter().zip(answers) {
                match answer {
                    Ok(Some(estimate)) => links.push(Link {
                        id: LinkId::between(&leg.from_item_id, &leg.to_item_id),
                        trip_id: trip_id.clone(),
                        day_id: day_id.clone(),
                        from_item_id: leg.from_item_id.clone(),
                        to_item_id: leg.to_item_id.clone(),
                        mode,
                        minutes: estimate.minutes,
                        cost: estimate.cost,
                        order: leg.index as f64 + 0.5,
                    }),
                    Ok(None) => {
                        warn!(from = %leg.from_item_id, to = %leg.to_item_id, %mode, "no route between stops");
                        gaps.push(Gap {
                            from_item_id: leg.from_item_id.clone(),
                            to_item_id: leg.to_item_id.clone(),
                            reason: GapReason::Unknown,
                        });
                    }
                    Err(e) => {
                        warn!(from = %leg.from_item_id, to = %leg.to_item_id, %mode, error = %e, "estimate failed");
                        gaps.push(Gap {
                            from_item_id: leg.from_item_id.clone(),
                            to_item_id: leg.to_item_id.clone(),
                            reason: GapReason::Unknown,
                        });
                    }
                }
            }
        }

        Draft {
            day_id,
            signature,
            links,
            gaps,
        }
    }

    /// Replace the day's links with the draft's, unless the day changed.
    pub fn commit(&self, store: &mut TripStore, draft: Draft) -> Result<Synthesis, SynthesisError> {
        let current = day_signature(store.graph(), &draft.day_id)
            .ok_or_else(|| GraphError::DayNotFound(draft.day_id.clone()))?;
        if current != draft.signature {
            debug!(day = %draft.day_id, "synthesis draft discarded");
            return Err(SynthesisError::Stale(draft.day_id));
        }

        let ids = draft.links.iter().map(|link| link.id.clone()).collect();
        store.replace_day_links(&draft.day_id, draft.links)?;
        debug!(day = %draft.day_id, "timeline synthesized");
        Ok(Synthesis {
            day_id: draft.day_id,
            signature: draft.signature,
            links: ids,
            gaps: draft.gaps,
        })
    }

    /// Run all three phases against one store.
    ///
    /// Convenient when nothing else can touch the store in between; callers
    /// that release the store while estimating use the phases directly.
    pub async fn synthesize<E: Estimator>(
        &self,
        store: &mut TripStore,
        day_id: &DayId,
        estimator: &E,
    ) -> Result<Synthesis, SynthesisError> {
        let plan = self.plan(store.graph(), day_id)?;
        let draft = self.estimate(plan, estimator).await;
        self.commit(store, draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemKind, NewItem, NewTrip};
    use crate::timeline::{Estimate, EstimateError, SpeedTableEstimator};
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    /// Answers 10 minutes for everything except pairs it was told to fail.
    #[derive(Default)]
    struct Scripted {
        fail_from: HashSet<(i64, i64)>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn failing_from(origin: Coordinate) -> Self {
            let mut s = Self::default();
            s.fail_from.insert(Self::key(origin));
            s
        }

        fn key(c: Coordinate) -> (i64, i64) {
            ((c.lat() * 1e5) as i64, (c.lng() * 1e5) as i64)
        }
    }

    impl Estimator for Scripted {
        async fn estimate(
            &self,
            origin: Coordinate,
            _destination: Coordinate,
            _mode: TransportMode,
        ) -> Result<Option<Estimate>, EstimateError> {
            *self.calls.lock().unwrap() += 1;
            if self.fail_from.contains(&Self::key(origin)) {
                return Err(EstimateError::Unavailable("timeout".into()));
            }
            Ok(Some(Estimate {
                minutes: 10,
                cost: 2.5,
            }))
        }
    }

    /// Day with stops A (located), B (no coordinate), C, D (located).
    fn fixture() -> (TripStore, DayId, Vec<ItemId>) {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut store = TripStore::new();
        let trip = store.create_trip(NewTrip::new("Saigon", date, 0).with_mode(TransportMode::Grab));
        let day = store.add_day(&trip, date).unwrap();
        let items = vec![
            store
                .add_item(&day, NewItem::new(ItemKind::Stop, "A").at(c(10.7725, 106.6980)))
                .unwrap(),
            store.add_item(&day, NewItem::new(ItemKind::Meal, "B")).unwrap(),
            store
                .add_item(&day, NewItem::new(ItemKind::Stop, "C").at(c(10.7798, 106.6990)))
                .unwrap(),
            store
                .add_item(&day, NewItem::new(ItemKind::Stop, "D").at(c(10.7769, 106.7009)))
                .unwrap(),
        ];
        (store, day, items)
    }

    #[tokio::test]
    async fn missing_coordinates_become_gaps() {
        let (mut store, day, items) = fixture();
        let est = Scripted::default();

        let result = Synthesizer::default()
            .synthesize(&mut store, &day, &est)
            .await
            .unwrap();

        assert_eq!(result.links, vec![LinkId::between(&items[2], &items[3])]);
        assert_eq!(
            result.gaps,
            vec![
                Gap {
                    from_item_id: items[0].clone(),
                    to_item_id: items[1].clone(),
                    reason: GapReason::MissingCoordinate,
                },
                Gap {
                    from_item_id: items[1].clone(),
                    to_item_id: items[2].clone(),
                    reason: GapReason::MissingCoordinate,
                },
            ]
        );

        let links = store.graph().links_of_day(&day);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].order, 2.5);
        assert_eq!(links[0].mode, TransportMode::Grab);
        assert_eq!(links[0].minutes, 10);
        store.graph().check_integrity().unwrap();
    }

    #[tokio::test]
    async fn estimator_failure_is_a_gap_not_an_error() {
        let (mut store, day, items) = fixture();
        let est = Scripted::failing_from(c(10.7798, 106.6990));

        let result = Synthesizer::default()
            .synthesize(&mut store, &day, &est)
            .await
            .unwrap();

        assert!(result.links.is_empty());
        assert_eq!(result.gaps.len(), 3);
        assert_eq!(result.gaps[2].from_item_id, items[2]);
        assert_eq!(result.gaps[2].reason, GapReason::Unknown);
    }

    #[tokio::test]
    async fn rerun_on_unchanged_day_is_idempotent() {
        let (mut store, day, items) = fixture();
        store
            .update_item(
                &items[1],
                crate::domain::ItemPatch {
                    coordinate: Some(Some(c(10.7760, 106.7000))),
                    ..Default::default()
                },
            )
            .unwrap();
        let synth = Synthesizer::new(2).with_mode(TransportMode::Walking);
        let est = SpeedTableEstimator::new();

        let first = synth.synthesize(&mut store, &day, &est).await.unwrap();
        let links_after_first = store.graph().clone();
        let second = synth.synthesize(&mut store, &day, &est).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.graph(), &links_after_first);
        assert_eq!(first.links.len(), 3);
        assert!(!needs_synthesis(store.graph(), &day, Some(&second.signature)));
    }

    #[tokio::test]
    async fn stale_draft_is_discarded() {
        let (mut store, day, _) = fixture();
        let synth = Synthesizer::default();
        let est = Scripted::default();

        let plan = synth.plan(store.graph(), &day).unwrap();
        let draft = synth.estimate(plan, &est).await;

        // The user reorders while estimates were in flight.
        store.reorder_day(&day, 3, 0).unwrap();
        let before = store.clone();

        assert_eq!(
            synth.commit(&mut store, draft),
            Err(SynthesisError::Stale(day.clone()))
        );
        assert_eq!(store, before);
    }

    #[tokio::test]
    async fn mode_change_makes_draft_stale() {
        let (mut store, day, _) = fixture();
        let trip = store.graph().day(&day).unwrap().trip_id.clone();
        let synth = Synthesizer::default();

        let plan = synth.plan(store.graph(), &day).unwrap();
        assert_eq!(plan.mode, TransportMode::Grab);
        let draft = synth.estimate(plan, &Scripted::default()).await;

        store.set_default_mode(&trip, TransportMode::Walking).unwrap();
        let before = store.clone();

        assert_eq!(
            synth.commit(&mut store, draft),
            Err(SynthesisError::Stale(day.clone()))
        );
        assert_eq!(store, before);
        assert!(store.graph().links_of_day(&day).is_empty());
    }

    #[tokio::test]
    async fn batches_cover_every_leg() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut store = TripStore::new();
        let trip = store.create_trip(NewTrip::new("Line", date, 0));
        let day = store.add_day(&trip, date).unwrap();
        for i in 0..7 {
            store
                .add_item(&day, NewItem::new(ItemKind::Stop, "p").at(c(0.0, i as f64 * 0.01)))
                .unwrap();
        }
        let est = Scripted::default();

        let result = Synthesizer::new(4).synthesize(&mut store, &day, &est).await.unwrap();
        assert_eq!(result.links.len(), 6);
        assert_eq!(*est.calls.lock().unwrap(), 6);
        let orders: Vec<f64> = store.graph().links_of_day(&day).iter().map(|l| l.order).collect();
        assert_eq!(orders, vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5]);
    }

    #[test]
    fn signature_tracks_order_and_pins() {
        let (mut store, day, items) = fixture();
        let sig = day_signature(store.graph(), &day).unwrap();
        assert!(sig.starts_with(&format!("grab:{}@10.77250,106.69800|{}@-", items[0], items[1])));
        assert!(needs_synthesis(store.graph(), &day, None));
        assert!(!needs_synthesis(store.graph(), &day, Some(&sig)));

        store
            .update_item(
                &items[3],
                crate::domain::ItemPatch {
                    coordinate: Some(Some(c(10.0, 106.0))),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(needs_synthesis(store.graph(), &day, Some(&sig)));

        let trip = store.graph().day(&day).unwrap().trip_id.clone();
        let pinned = day_signature(store.graph(), &day).unwrap();
        store.set_default_mode(&trip, TransportMode::Transit).unwrap();
        assert!(needs_synthesis(store.graph(), &day, Some(&pinned)));

        let ghost = DayId::new("ghost").unwrap();
        assert!(day_signature(store.graph(), &ghost).is_none());
        assert!(!needs_synthesis(store.graph(), &ghost, None));
    }
}
