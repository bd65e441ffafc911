//! Persistence error types.

use crate::domain::{DayId, TripId};

/// Errors raised by a [`TripRepository`](super::TripRepository).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PersistenceError {
    /// A day, item or link names a trip that was never saved
    #[error("trip {0} has not been saved")]
    UnknownTrip(TripId),

    #[error("day {0} is not stored")]
    UnknownDay(DayId),

    /// A reorder does not match the stored items of the day
    #[error("reorder of day {0} does not match its stored items")]
    ReorderMismatch(DayId),

    /// Reading or writing the backing storage failed
    #[error("storage error: {message}")]
    Storage { message: String },

    /// A stored document could not be parsed
    #[error("corrupt document {path}: {message}")]
    Corrupt { path: String, message: String },
}
