//! Timeline synthesis.
//!
//! Turns a day's ordered stops into a timeline with move blocks between
//! them. Travel time and fare for each leg come from an [`Estimator`];
//! [`CachedEstimator`] puts a TTL cache in front of any estimator and
//! [`SpeedTableEstimator`] is the offline fallback.

mod cache;
mod estimator;
mod speed;
mod synth;

pub use cache::{CacheConfig, CachedEstimator};
pub use estimator::{Estimate, EstimateError, Estimator};
pub use speed::SpeedTableEstimator;
pub use synth::{
    DEFAULT_BATCH_SIZE, Draft, Gap, GapReason, Leg, Synthesis, SynthesisError, SynthesisPlan,
    Synthesizer, day_signature, needs_synthesis,
};
