//! iCalendar export.
//!
//! Items carry local wall-clock times in their trip's timezone; events are
//! written with UTC timestamps. Items whose times cannot be exported are
//! reported back with a [`SkipReason`] instead of being guessed at.
//!
//! The `VTIMEZONE` block is always a single `STANDARD` rule. For zones that
//! observe daylight saving this is an approximation and the export says so
//! through [`CalendarExport::approximate_timezone`]; the event times
//! themselves are exact because they are written in UTC.

mod ics;
mod tz;

use chrono::{DateTime, Utc};

use crate::domain::{DayId, GraphError, Item, ItemId, TripId};
use crate::store::TripGraph;

pub use ics::{escape_text, export, fold_line};

/// Content type of an export.
pub const MIME_TYPE: &str = "text/calendar";

/// Why an item was left out of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither start nor end is set.
    MissingTimes,
    /// Only the end is set.
    MissingStart,
    EndBeforeStart,
    /// The wall-clock time falls in a daylight-saving gap.
    NonexistentLocalTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub item_id: ItemId,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarExport {
    /// CRLF-terminated iCalendar text.
    pub ics: String,
    pub events: usize,
    pub skipped: Vec<Skipped>,
    /// The `VTIMEZONE` block flattens a daylight-saving zone.
    pub approximate_timezone: bool,
}

impl CalendarExport {
    pub fn mime_type(&self) -> &'static str {
        MIME_TYPE
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalendarError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Export one day of a trip in visiting order.
pub fn export_day(
    graph: &TripGraph,
    day_id: &DayId,
    generated_at: DateTime<Utc>,
) -> Result<CalendarExport, CalendarError> {
    let day = graph
        .day(day_id)
        .ok_or_else(|| GraphError::DayNotFound(day_id.clone()))?;
    let trip = graph
        .trip(&day.trip_id)
        .ok_or_else(|| GraphError::TripNotFound(day.trip_id.clone()))?;

    let title = format!("{} ({})", trip.title, day.date);
    export(
        &title,
        &graph.items_of_day(day_id),
        trip.timezone.as_deref(),
        generated_at,
    )
}

/// Export every day of a trip, days in display order.
pub fn export_trip(
    graph: &TripGraph,
    trip_id: &TripId,
    generated_at: DateTime<Utc>,
) -> Result<CalendarExport, CalendarError> {
    let trip = graph
        .trip(trip_id)
        .ok_or_else(|| GraphError::TripNotFound(trip_id.clone()))?;
    let items: Vec<&Item> = graph
        .days_of_trip(trip_id)
        .into_iter()
        .flat_map(|day| graph.items_of_day(&day.id))
        .collect();
    export(&trip.title, &items, trip.timezone.as_deref(), generated_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemKind, NewItem, NewTrip};
    use crate::store::TripStore;
    use chrono::{NaiveDate, TimeZone};

    fn at(d: u32, h: u32, m: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn trip_export_spans_days() {
        let mut store = TripStore::new();
        let trip = store.create_trip(
            NewTrip::new("Saigon", at(1, 0, 0).date(), 1).with_timezone("Asia/Ho_Chi_Minh"),
        );
        let d1 = store.add_day(&trip, at(1, 0, 0).date()).unwrap();
        let d2 = store.add_day(&trip, at(2, 0, 0).date()).unwrap();
        store
            .add_item(&d1, NewItem::new(ItemKind::Meal, "Pho").between(at(1, 8, 0), at(1, 9, 0)))
            .unwrap();
        store
            .add_item(&d2, NewItem::new(ItemKind::Activity, "Cu Chi"))
            .unwrap();
        store
            .add_item(&d2, NewItem::new(ItemKind::Stop, "Market").between(at(2, 15, 0), at(2, 16, 0)))
            .unwrap();

        let generated = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let export = export_trip(store.graph(), &trip, generated).unwrap();
        assert_eq!(export.events, 2);
        assert_eq!(export.skipped.len(), 1);
        assert_eq!(export.skipped[0].reason, SkipReason::MissingTimes);
        assert!(!export.approximate_timezone);
        // 08:00 +07 is 01:00 UTC.
        assert!(export.ics.contains("DTSTART:20250301T010000Z\r\n"));
        assert_eq!(export.mime_type(), "text/calendar");

        let day = export_day(store.graph(), &d2, generated).unwrap();
        assert_eq!(day.events, 1);
        assert!(day.ics.contains("X-WR-CALNAME:Saigon (2025-03-02)\r\n"));
    }

    #[test]
    fn missing_entities_are_graph_errors() {
        let store = TripStore::new();
        let generated = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let err = export_trip(store.graph(), &TripId::new("t").unwrap(), generated).unwrap_err();
        assert!(matches!(err, CalendarError::Graph(GraphError::TripNotFound(_))));
    }
}
