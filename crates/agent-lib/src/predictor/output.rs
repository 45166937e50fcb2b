//! SoH derivation from raw model output

use crate::models::SoHEstimate;

/// Rated capacity of a new cell in ampere-hours. B0005-class cells ship at
/// 1.85 Ah nominal.
pub const DEFAULT_REFERENCE_CAPACITY_AH: f32 = 1.85;

/// Converts a predicted capacity into a [`SoHEstimate`] against a reference
/// capacity.
///
/// The SoH fraction is deliberately not clamped: a model that emits a
/// capacity above reference (or garbage from a broken artifact) produces an
/// out-of-range SoH that stays visible to operators instead of being
/// silently corrected.
#[derive(Debug, Clone)]
pub struct SohCalculator {
    reference_capacity_ah: f32,
}

impl Default for SohCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_CAPACITY_AH)
    }
}

impl SohCalculator {
    pub fn new(reference_capacity_ah: f32) -> Self {
        Self {
            reference_capacity_ah,
        }
    }

    pub fn estimate(
        &self,
        device_id: &str,
        cycle_id: u64,
        capacity_ah: f32,
        model_version: String,
    ) -> SoHEstimate {
        SoHEstimate {
            device_id: device_id.to_string(),
            cycle_id,
            soh: capacity_ah / self.reference_capacity_ah,
            capacity_ah,
            model_version,
            computed_at: chrono::Utc::now().timestamp(),
        }
    }
}
