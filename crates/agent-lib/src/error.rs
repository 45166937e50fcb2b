//! Error types for the telemetry pipeline
//!
//! Ingestion-time errors (`MalformedSample`, `StaleCycle`) are local and
//! non-fatal: the offending sample is dropped, counted, and the stream keeps
//! flowing. `PredictorUnavailable` is a per-cycle failure reported to the
//! operator, never a process error.

use thiserror::Error;

/// Validation failure for a single raw telemetry record.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed telemetry sample: {reason}")]
    MalformedSample { reason: String },
}

/// Failure while folding a sample into per-device cycle state.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The sample's cycle id is lower than the highest id already seen for
    /// the device. The aggregator assumes non-decreasing cycle ids and does
    /// not reorder or reconcile.
    #[error("stale cycle {cycle_id} for device {device_id} (last seen {last_seen})")]
    StaleCycle {
        device_id: String,
        cycle_id: u64,
        last_seen: u64,
    },

    /// The operator-visible bound on tracked devices was hit. Guards against
    /// unbounded accumulator growth when a fleet misbehaves.
    #[error("device limit {limit} reached, refusing to track device {device_id}")]
    DeviceLimitExceeded { device_id: String, limit: usize },
}

/// Failure while deriving features from a closed cycle.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// A cycle closed with zero samples. The aggregator only closes
    /// non-empty cycles, so seeing this indicates an aggregator bug.
    #[error("cycle closed with zero samples")]
    EmptyCycle,
}

/// Failure obtaining a SoH prediction for a completed cycle.
#[derive(Debug, Error)]
pub enum PredictError {
    /// Timeout or fault from the scoring model. The cycle's features were
    /// already emitted; the failure is reported once and not retried.
    #[error("predictor unavailable: {reason}")]
    PredictorUnavailable { reason: String },
}
