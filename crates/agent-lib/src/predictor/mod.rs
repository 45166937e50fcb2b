//! SoH prediction engine
//!
//! The scoring capability is a port: the pipeline depends on [`SohModel`]
//! and never on a concrete implementation, so tests swap in deterministic
//! mocks without touching aggregation logic.

mod features;
mod inference;
mod output;

pub use features::FeatureExtractor;
pub use inference::{HeuristicSohModel, InferenceStats, OnnxSohModel};
pub use output::{SohCalculator, DEFAULT_REFERENCE_CAPACITY_AH};

use crate::models::CycleFeatures;
use anyhow::Result;

/// Capacity regression model trained offline on historical discharge cycles.
///
/// Implementations must be deterministic for identical input and total for
/// well-formed features. Returns the predicted remaining capacity in Ah; the
/// [`SohCalculator`] turns that into a SoH fraction.
pub trait SohModel: Send + Sync {
    fn predict(&self, features: &CycleFeatures) -> Result<f32>;

    /// Version label carried on every estimate produced with this model.
    fn version(&self) -> String;
}
