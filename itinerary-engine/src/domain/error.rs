//! Graph error types.
//!
//! These are the structural failures of the trip graph: a mutation named an
//! entity that does not exist, or asked for something the graph's invariants
//! forbid. The store leaves its state unchanged whenever it returns one.

use super::{DayId, ItemId, TripId};

/// Structural errors raised by trip graph mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("trip {0} not found")]
    TripNotFound(TripId),

    #[error("day {0} not found")]
    DayNotFound(DayId),

    #[error("item {0} not found")]
    ItemNotFound(ItemId),

    /// A source index does not address an item of the day
    #[error("index {index} out of range for day {day} with {len} items")]
    IndexOutOfRange { day: DayId, index: usize, len: usize },

    /// Items cannot change trips
    #[error("item {item} cannot move to day {day} of another trip")]
    CrossTripMove { item: ItemId, day: DayId },

    /// An imported record contradicts itself (e.g. an item listed by a day
    /// of another trip)
    #[error("inconsistent trip graph: {0}")]
    Inconsistent(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = GraphError::DayNotFound(DayId::new("d9").unwrap());
        assert_eq!(err.to_string(), "day d9 not found");

        let err = GraphError::IndexOutOfRange {
            day: DayId::new("d1").unwrap(),
            index: 4,
            len: 2,
        };
        assert_eq!(err.to_string(), "index 4 out of range for day d1 with 2 items");

        let err = GraphError::CrossTripMove {
            item: ItemId::new("i1").unwrap(),
            day: DayId::new("d7").unwrap(),
        };
        assert_eq!(err.to_string(), "item i1 cannot move to day d7 of another trip");

        let err = GraphError::TripNotFound(TripId::new("t0").unwrap());
        assert_eq!(err.to_string(), "trip t0 not found");
    }
}
