//! Bounded undo/redo stacks.
//!
//! ```text
//! record(a), record(b), record(c)
//!   undo: [a, b, c]   redo: []
//! undo() x2
//!   undo: [a]         redo: [c, b]
//! record(d)           <-- new branch, clears redo
//!   undo: [a, d]      redo: []
//! ```

use std::collections::VecDeque;
use std::fmt;

use tracing::trace;

use super::Snapshotting;

/// Default number of transitions kept for undo.
pub const DEFAULT_DEPTH: usize = 100;

/// One recorded change: the state before and after it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S> {
    pub label: String,
    pub prev: S,
    pub next: S,
}

/// Undo and redo stacks for a [`Snapshotting`] target.
///
/// The oldest transition is evicted once `max_depth` is exceeded, and any
/// new transition clears the redo stack.
pub struct History<T: Snapshotting> {
    /// Newest at the back.
    undo_stack: VecDeque<Transition<T::Snapshot>>,
    /// Newest at the back.
    redo_stack: Vec<Transition<T::Snapshot>>,
    max_depth: usize,
}

impl<T: Snapshotting> fmt::Debug for History<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("undo_depth", &self.undo_stack.len())
            .field("redo_depth", &self.redo_stack.len())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl<T: Snapshotting> Default for History<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

impl<T: Snapshotting> History<T> {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Push an already-applied transition.
    pub fn push(&mut self, transition: Transition<T::Snapshot>) {
        self.redo_stack.clear();
        self.undo_stack.push_back(transition);
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    /// Run `mutate` against `target`, recording the transition if it
    /// succeeded and changed anything.
    ///
    /// A failed mutation records nothing; callers rely on `mutate` leaving
    /// the target unchanged when it fails.
    pub fn record<R, E>(
        &mut self,
        target: &mut T,
        label: impl Into<String>,
        mutate: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<R, E> {
        let prev = target.snapshot();
        let result = mutate(target)?;
        let next = target.snapshot();
        if prev != next {
            let label = label.into();
            trace!(%label, "transition recorded");
            self.push(Transition { label, prev, next });
        }
        Ok(result)
    }

    /// Restore the state before the latest transition.
    ///
    /// Returns the undone transition's label, or `None` when there is
    /// nothing to undo.
    pub fn undo(&mut self, target: &mut T) -> Option<String> {
        let transition = self.undo_stack.pop_back()?;
        target.restore(transition.prev.clone());
        let label = transition.label.clone();
        self.redo_stack.push(transition);
        Some(label)
    }

    /// Re-apply the most recently undone transition.
    pub fn redo(&mut self, target: &mut T) -> Option<String> {
        let transition = self.redo_stack.pop()?;
        target.restore(transition.next.clone());
        let label = transition.label.clone();
        self.undo_stack.push_back(transition);
        Some(label)
    }

    /// Drop the latest transition without touching the target, provided it
    /// ends in `next`.
    ///
    /// Used when a change was reverted through another channel and must not
    /// be undone a second time.
    pub fn retract(&mut self, next: &T::Snapshot) -> Option<Transition<T::Snapshot>> {
        if self.undo_stack.back().is_some_and(|t| &t.next == next) {
            self.undo_stack.pop_back()
        } else {
            None
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Label of the transition `undo` would revert.
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|t| t.label.as_str())
    }

    /// Label of the transition `redo` would re-apply.
    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(|t| t.label.as_str())
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
