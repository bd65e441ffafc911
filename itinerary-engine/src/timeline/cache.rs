//! Caching layer for travel estimates.
//!
//! Estimates for the same pair of places are requested over and over while
//! a user shuffles a day around. Coordinates are quantized before keying so
//! that pins differing by GPS noise share an entry.

use std::time::Duration;

use moka::future::Cache as MokaCache;
use tracing::trace;

use crate::domain::{Coordinate, TransportMode};

use super::estimator::{Estimate, EstimateError, Estimator};

/// (origin lat, origin lng, destination lat, destination lng, mode), with
/// coordinates in quantization steps.
type EstimateKey = (i64, i64, i64, i64, TransportMode);

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,

    /// Quantization step in degrees.
    pub precision: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
            max_capacity: 10_000,
            precision: 1e-5,
        }
    }
}

/// Estimator with caching.
///
/// Wraps any [`Estimator`] and caches its answers, including "no route".
/// Errors are never cached.
pub struct CachedEstimator<E> {
    inner: E,
    cache: MokaCache<EstimateKey, Option<Estimate>>,
    precision: f64,
}

impl<E: Estimator> CachedEstimator<E> {
    /// Create a new cached estimator.
    pub fn new(inner: E, config: &CacheConfig) -> Self {
        let cache = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self {
            inner,
            cache,
            precision: config.precision,
        }
    }

    fn quantize(&self, value: f64) -> i64 {
        (value / self.precision).round() as i64
    }

    fn key(&self, origin: &Coordinate, destination: &Coordinate, mode: TransportMode) -> EstimateKey {
        (
            self.quantize(origin.lat()),
            self.quantize(origin.lng()),
            self.quantize(destination.lat()),
            self.quantize(destination.lng()),
            mode,
        )
    }

    /// Access the wrapped estimator for requests that bypass the cache.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Get cache statistics.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

impl<E: Estimator> Estimator for CachedEstimator<E> {
    async fn estimate(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: TransportMode,
    ) -> Result<Option<Estimate>, EstimateError> {
        let key = self.key(&origin, &destination, mode);

        // Try cache first
        if let Some(cached) = self.cache.get(&key).await {
            trace!(%origin, %destination, %mode, "estimate cache hit");
            return Ok(cached);
        }

        let answer = self.inner.estimate(origin, destination, mode).await?;
        self.cache.insert(key, answer).await;
        Ok(answer)
    }
}
