//! Core library for the battery digital twin agent
//!
//! This crate provides:
//! - Telemetry sample validation and normalization
//! - Per-device cycle aggregation with boundary detection
//! - Feature extraction for completed discharge cycles
//! - The SoH prediction port with ONNX-backed and heuristic models
//! - Maintenance alert evaluation
//! - The streaming pipeline tying the stages together
//! - Health checks and observability

pub mod alert;
pub mod cycle;
pub mod error;
pub mod health;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod predictor;

pub use alert::{AlertDecision, AlertEvaluator, AlertSeverity, DEFAULT_ALERT_THRESHOLD};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
pub use pipeline::{CyclePipeline, PipelineConfig, PipelineEvent};
