//! Planner error types.

use crate::calendar::CalendarError;
use crate::domain::GraphError;
use crate::history::UndoError;
use crate::optimizer::OptimizeError;
use crate::persistence::PersistenceError;
use crate::timeline::SynthesisError;

/// Errors surfaced by [`TripPlanner`](super::TripPlanner) operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlannerError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Optimize(#[from] OptimizeError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Undo(#[from] UndoError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
