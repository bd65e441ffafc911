//! Undo and redo over snapshot transitions.
//!
//! [`History`] keeps the classic pair of stacks; [`UndoWindows`] offers the
//! "deleted. undo?" flavour where a change applies at once and can be taken
//! back only within a short window. Both work on any [`Snapshotting`]
//! target by capturing whole snapshots before and after a mutation, so
//! restoring is exact by construction.

mod stack;
mod timed;

pub use stack::{History, Transition};
pub use timed::{UndoError, UndoEvent, UndoToken, UndoWindows};

/// State that can be captured and later put back verbatim.
pub trait Snapshotting {
    type Snapshot: Clone + PartialEq;

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: Self::Snapshot);

    /// Whether `current` has moved on from `expected` in a way that makes
    /// restoring an older snapshot over it unsafe. Targets holding derived
    /// data narrow this to the data it is derived from.
    fn diverged(current: &Self::Snapshot, expected: &Self::Snapshot) -> bool {
        current != expected
    }
}
