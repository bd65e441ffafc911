//! The four graph entities: Trip, Day, Item and Link.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{Coordinate, DayId, ItemId, LinkId, TransportMode, TripId};

/// A planning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub title: String,
    pub start_date: NaiveDate,
    pub nights: u32,
    /// ISO 4217 code, e.g. "VND".
    pub currency: String,
    pub default_mode: TransportMode,
    /// IANA zone the trip's wall-clock times are expressed in.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Trip {
    /// The dates covered by the trip: `nights + 1` consecutive days.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start_date.iter_days().take(self.nights as usize + 1)
    }
}

/// Parameters for creating a trip. The store assigns the identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrip {
    pub title: String,
    pub start_date: NaiveDate,
    pub nights: u32,
    pub currency: String,
    #[serde(default)]
    pub default_mode: TransportMode,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl NewTrip {
    pub fn new(title: impl Into<String>, start_date: NaiveDate, nights: u32) -> Self {
        Self {
            title: title.into(),
            start_date,
            nights,
            currency: "USD".to_string(),
            default_mode: TransportMode::default(),
            timezone: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_mode(mut self, mode: TransportMode) -> Self {
        self.default_mode = mode;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }
}

/// One calendar day of a trip.
///
/// `item_ids` is the authoritative order of the day's items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub id: DayId,
    pub trip_id: TripId,
    pub date: NaiveDate,
    pub item_ids: Vec<ItemId>,
    /// Display order among the trip's days.
    pub order: u32,
}

impl Day {
    /// Position of an item within this day.
    pub fn position(&self, item_id: &ItemId) -> Option<usize> {
        self.item_ids.iter().position(|id| id == item_id)
    }
}

/// What kind of stop an item is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Stop,
    Meal,
    Activity,
    Custom,
}

/// A single stop within a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub trip_id: TripId,
    pub day_id: DayId,
    pub kind: ItemKind,
    pub title: String,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    #[serde(default)]
    pub rating: Option<f64>,
    /// Free-form address, the input for geocoding.
    #[serde(default)]
    pub address: Option<String>,
    /// Local wall-clock start in the trip's timezone.
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Parameters for adding an item. Parent ids are taken from the target day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub kind: ItemKind,
    pub title: String,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub start: Option<NaiveDateTime>,
    #[serde(default)]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewItem {
    pub fn new(kind: ItemKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn between(mut self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub(crate) fn into_item(self, id: ItemId, trip_id: TripId, day_id: DayId) -> Item {
        Item {
            id,
            trip_id,
            day_id,
            kind: self.kind,
            title: self.title,
            coordinate: self.coordinate,
            rating: self.rating,
            address: self.address,
            start: self.start,
            end: self.end,
            cost: self.cost,
            note: self.note,
        }
    }
}

/// A partial update to an item.
///
/// Outer `None` leaves a field untouched; for optional fields `Some(None)`
/// clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub kind: Option<ItemKind>,
    pub title: Option<String>,
    pub coordinate: Option<Option<Coordinate>>,
    pub rating: Option<Option<f64>>,
    pub address: Option<Option<String>>,
    pub start: Option<Option<NaiveDateTime>>,
    pub end: Option<Option<NaiveDateTime>>,
    pub cost: Option<Option<f64>>,
    pub note: Option<Option<String>>,
}

impl ItemPatch {
    /// Apply the patch. Returns true if the coordinate changed.
    pub(crate) fn apply(self, item: &mut Item) -> bool {
        if let Some(kind) = self.kind {
            item.kind = kind;
        }
        if let Some(title) = self.title {
            item.title = title;
        }
        let mut moved = false;
        if let Some(coordinate) = self.coordinate {
            moved = item.coordinate != coordinate;
            item.coordinate = coordinate;
        }
        if let Some(rating) = self.rating {
            item.rating = rating;
        }
        if let Some(address) = self.address {
            item.address = address;
        }
        if let Some(start) = self.start {
            item.start = start;
        }
        if let Some(end) = self.end {
            item.end = end;
        }
        if let Some(cost) = self.cost {
            item.cost = cost;
        }
        if let Some(note) = self.note {
            item.note = note;
        }
        moved
    }
}

/// A synthesized move block between two adjacent items.
///
/// Links are derived data: they are rebuilt from the items and never
/// consulted as a source of trip content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub trip_id: TripId,
    pub day_id: DayId,
    pub from_item_id: ItemId,
    pub to_item_id: ItemId,
    pub mode: TransportMode,
    pub minutes: u32,
    pub cost: f64,
    /// Sits strictly between the orders of its two items.
    pub order: f64,
}
