//! Feature extraction for completed cycles
//!
//! Converts a closed cycle's raw accumulation into the fixed feature vector
//! the capacity model expects: mean internal resistance, discharge duration,
//! and mean voltage.

use crate::cycle::ClosedCycle;
use crate::error::FeatureError;
use crate::models::CycleFeatures;
use tracing::warn;

/// Pure accumulator-to-features conversion.
#[derive(Debug, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Derive [`CycleFeatures`] from a closed cycle.
    ///
    /// Duration is `last - first` timestamp and must be non-negative; a
    /// stream that violated timestamp monotonicity within the cycle gets a
    /// zero duration instead, and the clamp is logged so it stays visible.
    /// [`FeatureError::EmptyCycle`] is returned for a zero-sample
    /// accumulator, which the aggregator never produces.
    pub fn extract(&self, closed: &ClosedCycle) -> Result<CycleFeatures, FeatureError> {
        let acc = &closed.accumulator;
        if acc.sample_count == 0 {
            return Err(FeatureError::EmptyCycle);
        }

        let n = acc.sample_count as f64;
        let mut duration_s = acc.last_timestamp_s - acc.first_timestamp_s;
        if duration_s < 0.0 {
            warn!(
                device_id = %closed.device_id,
                cycle_id = acc.cycle_id,
                duration_s,
                "Non-monotonic timestamps within cycle, clamping duration to zero"
            );
            duration_s = 0.0;
        }

        Ok(CycleFeatures {
            avg_resistance: acc.resistance_sum / n,
            avg_voltage: acc.voltage_sum / n,
            duration_s,
            sample_count: acc.sample_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CycleAccumulator;

    fn closed(accumulator: CycleAccumulator) -> ClosedCycle {
        ClosedCycle {
            device_id: "B0005".to_string(),
            accumulator,
        }
    }

    #[test]
    fn test_averages_are_arithmetic_means() {
        // Resistances [0.10, 0.12, 0.11], voltages [3.7, 3.6, 3.5], 300 s.
        let acc = CycleAccumulator {
            cycle_id: 1,
            sample_count: 3,
            resistance_sum: 0.33,
            voltage_sum: 10.8,
            first_timestamp_s: 0.0,
            last_timestamp_s: 300.0,
        };

        let features = FeatureExtractor::new().extract(&closed(acc)).unwrap();
        assert!((features.avg_resistance - 0.11).abs() < 1e-9);
        assert!((features.avg_voltage - 3.6).abs() < 1e-9);
        assert_eq!(features.duration_s, 300.0);
        assert_eq!(features.sample_count, 3);
    }

    #[test]
    fn test_single_sample_cycle_has_zero_duration() {
        let acc = CycleAccumulator {
            cycle_id: 1,
            sample_count: 1,
            resistance_sum: 0.1,
            voltage_sum: 3.7,
            first_timestamp_s: 12.0,
            last_timestamp_s: 12.0,
        };

        let features = FeatureExtractor::new().extract(&closed(acc)).unwrap();
        assert_eq!(features.duration_s, 0.0);
    }

    #[test]
    fn test_negative_duration_clamped_to_zero() {
        let acc = CycleAccumulator {
            cycle_id: 1,
            sample_count: 2,
            resistance_sum: 0.2,
            voltage_sum: 7.2,
            first_timestamp_s: 100.0,
            last_timestamp_s: 40.0,
        };

        let features = FeatureExtractor::new().extract(&closed(acc)).unwrap();
        assert_eq!(features.duration_s, 0.0);
    }

    #[test]
    fn test_empty_cycle_is_an_error() {
        let acc = CycleAccumulator {
            cycle_id: 1,
            sample_count: 0,
            resistance_sum: 0.0,
            voltage_sum: 0.0,
            first_timestamp_s: 0.0,
            last_timestamp_s: 0.0,
        };

        let err = FeatureExtractor::new().extract(&closed(acc)).unwrap_err();
        assert!(matches!(err, FeatureError::EmptyCycle));
    }

    #[test]
    fn test_model_input_ordering() {
        let features = CycleFeatures {
            avg_resistance: 0.11,
            avg_voltage: 3.6,
            duration_s: 300.0,
            sample_count: 3,
        };
        let input = features.to_model_input();
        assert!((input[0] - 0.11).abs() < 1e-6);
        assert_eq!(input[1], 300.0);
        assert!((input[2] - 3.6).abs() < 1e-6);
    }
}
