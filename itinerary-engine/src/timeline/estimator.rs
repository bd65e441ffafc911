//! The travel estimate boundary.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{Coordinate, TransportMode};

/// Travel time and fare for one leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub minutes: u32,
    /// In the trip's currency.
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimateError {
    #[error("estimator unavailable: {0}")]
    Unavailable(String),

    #[error("invalid estimator response: {0}")]
    InvalidResponse(String),
}

/// Source of travel estimates between two coordinates.
///
/// `Ok(None)` means the estimator has no answer for the pair (no route);
/// an `Err` means it could not be asked at all. The synthesizer treats both
/// as a gap.
#[allow(async_fn_in_trait)]
pub trait Estimator {
    async fn estimate(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
    ) -> Result<Option<Estimate>, EstimateError>;
}

impl<E: Estimator> Estimator for &E {
    async fn estimate(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
    ) -> Result<Option<Estimate>, EstimateError> {
        (**self).estimate(origin, destination, mode).await
    }
}

impl<E: Estimator> Estimator for Arc<E> {
    async fn estimate(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
    ) -> Result<Option<Estimate>, EstimateError> {
        (**self).estimate(origin, destination, mode).await
    }
}
