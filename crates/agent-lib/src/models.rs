//! Core data models for the battery twin agent

use serde::{Deserialize, Serialize};

/// One validated telemetry reading from a battery under monitoring.
///
/// Produced by the sample ingestor, consumed exactly once by the cycle
/// aggregator. Timestamps are seconds elapsed in the device's stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub device_id: String,
    pub cycle_id: u64,
    /// Measurement index within the cycle, carried for log correlation.
    pub step: u64,
    pub timestamp_s: f64,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub internal_resistance: f64,
}

/// Per-cycle feature vector handed to the SoH model.
///
/// Derived from a closed accumulator; `sample_count` is always at least 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleFeatures {
    pub avg_resistance: f64,
    pub avg_voltage: f64,
    pub duration_s: f64,
    pub sample_count: u64,
}

impl CycleFeatures {
    /// Flatten into the model input layout. The ordering matches the
    /// training pipeline: [avg_resistance, duration_s, avg_voltage].
    pub fn to_model_input(&self) -> [f32; 3] {
        [
            self.avg_resistance as f32,
            self.duration_s as f32,
            self.avg_voltage as f32,
        ]
    }
}

/// Completed-cycle event emitted as soon as a cycle boundary is detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedCycle {
    pub device_id: String,
    pub cycle_id: u64,
    pub features: CycleFeatures,
}

/// State-of-Health estimate for one completed cycle.
///
/// `soh` is a fraction of reference capacity, nominally in [0, 1] but never
/// clamped: a degenerate model output passes through so operators can see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoHEstimate {
    pub device_id: String,
    pub cycle_id: u64,
    pub soh: f32,
    /// Raw model output, in ampere-hours.
    pub capacity_ah: f32,
    pub model_version: String,
    /// Unix timestamp (seconds) at which the estimate was computed.
    pub computed_at: i64,
}
