//! Running statistics for one open cycle

use crate::models::TelemetrySample;

/// Mutable per-(device, cycle) state: sample count, running sums, and
/// timestamp bounds. Created from the first sample of a cycle and destroyed
/// when the cycle closes, so a live accumulator is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleAccumulator {
    pub cycle_id: u64,
    pub sample_count: u64,
    pub resistance_sum: f64,
    pub voltage_sum: f64,
    /// Timestamp of the first sample folded in.
    pub first_timestamp_s: f64,
    /// Timestamp of the most recently folded sample, in arrival order. A
    /// stream violating timestamp monotonicity can leave this below
    /// `first_timestamp_s`; the feature extractor handles that case.
    pub last_timestamp_s: f64,
}

impl CycleAccumulator {
    /// Open a new accumulator seeded with the cycle's first sample.
    pub fn open(sample: &TelemetrySample) -> Self {
        Self {
            cycle_id: sample.cycle_id,
            sample_count: 1,
            resistance_sum: sample.internal_resistance,
            voltage_sum: sample.voltage,
            first_timestamp_s: sample.timestamp_s,
            last_timestamp_s: sample.timestamp_s,
        }
    }

    /// Fold one more sample of the same cycle into the running statistics.
    pub fn fold(&mut self, sample: &TelemetrySample) {
        self.sample_count += 1;
        self.resistance_sum += sample.internal_resistance;
        self.voltage_sum += sample.voltage;
        self.last_timestamp_s = sample.timestamp_s;
    }
}
