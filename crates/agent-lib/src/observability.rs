//! Observability infrastructure for the battery twin agent
//!
//! Provides:
//! - Prometheus metrics (sample/cycle counters, inference latency, model
//!   version info)
//! - Structured logging for the pipeline's business events

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for inference latency (seconds). Inference targets
/// single-digit milliseconds; the tail covers timeout territory.
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once per process)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

struct AgentMetricsInner {
    samples_ingested: IntCounter,
    malformed_samples: IntCounter,
    stale_samples: IntCounter,
    device_limit_rejections: IntCounter,
    cycles_completed: IntCounter,
    predictions_generated: IntCounter,
    predictor_failures: IntCounter,
    alerts_raised: IntCounter,
    devices_tracked: IntGauge,
    inference_latency_seconds: Histogram,
    model_version_info: GaugeVec,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            samples_ingested: register_int_counter!(
                "battery_agent_samples_ingested_total",
                "Telemetry samples accepted by the ingestor"
            )
            .expect("Failed to register samples_ingested_total"),

            malformed_samples: register_int_counter!(
                "battery_agent_malformed_samples_total",
                "Telemetry records dropped by validation"
            )
            .expect("Failed to register malformed_samples_total"),

            stale_samples: register_int_counter!(
                "battery_agent_stale_samples_total",
                "Samples rejected for carrying an out-of-order cycle id"
            )
            .expect("Failed to register stale_samples_total"),

            device_limit_rejections: register_int_counter!(
                "battery_agent_device_limit_rejections_total",
                "Samples rejected because the tracked-device bound was hit"
            )
            .expect("Failed to register device_limit_rejections_total"),

            cycles_completed: register_int_counter!(
                "battery_agent_cycles_completed_total",
                "Discharge cycles closed by boundary detection or flush"
            )
            .expect("Failed to register cycles_completed_total"),

            predictions_generated: register_int_counter!(
                "battery_agent_predictions_generated_total",
                "SoH estimates produced by the capacity model"
            )
            .expect("Failed to register predictions_generated_total"),

            predictor_failures: register_int_counter!(
                "battery_agent_predictor_failures_total",
                "Completed cycles whose prediction timed out or errored"
            )
            .expect("Failed to register predictor_failures_total"),

            alerts_raised: register_int_counter!(
                "battery_agent_alerts_raised_total",
                "Maintenance alerts with severity above none"
            )
            .expect("Failed to register alerts_raised_total"),

            devices_tracked: register_int_gauge!(
                "battery_agent_devices_tracked",
                "Devices with live pipeline workers"
            )
            .expect("Failed to register devices_tracked"),

            inference_latency_seconds: register_histogram!(
                "battery_agent_inference_latency_seconds",
                "Wall time of capacity model calls, including timeouts",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            model_version_info: register_gauge_vec!(
                "battery_agent_model_version_info",
                "Information about the currently loaded capacity model",
                &["version"]
            )
            .expect("Failed to register model_version_info"),
        }
    }
}

/// Lightweight handle to the process-global metrics; clones share the same
/// underlying registry.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_samples_ingested(&self) {
        self.inner().samples_ingested.inc();
    }

    pub fn inc_malformed_samples(&self) {
        self.inner().malformed_samples.inc();
    }

    pub fn inc_stale_samples(&self) {
        self.inner().stale_samples.inc();
    }

    pub fn inc_device_limit_rejections(&self) {
        self.inner().device_limit_rejections.inc();
    }

    pub fn inc_cycles_completed(&self) {
        self.inner().cycles_completed.inc();
    }

    pub fn inc_predictions_generated(&self) {
        self.inner().predictions_generated.inc();
    }

    pub fn inc_predictor_failures(&self) {
        self.inner().predictor_failures.inc();
    }

    pub fn inc_alerts_raised(&self) {
        self.inner().alerts_raised.inc();
    }

    pub fn set_devices_tracked(&self, count: i64) {
        self.inner().devices_tracked.set(count);
    }

    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    pub fn set_model_version(&self, version: &str) {
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version])
            .set(1.0);
    }
}

/// Structured logger for the agent's business events.
///
/// Keeps event names and field sets consistent so downstream log pipelines
/// can index on them.
#[derive(Clone, Default)]
pub struct StructuredLogger;

impl StructuredLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn log_startup(&self, agent_version: &str, model_version: &str) {
        info!(
            event = "agent_started",
            agent_version = %agent_version,
            model_version = %model_version,
            "Battery twin agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            reason = %reason,
            "Battery twin agent shutting down"
        );
    }

    pub fn log_cycle_completed(
        &self,
        device_id: &str,
        cycle_id: u64,
        avg_resistance: f64,
        avg_voltage: f64,
        duration_s: f64,
        sample_count: u64,
    ) {
        info!(
            event = "cycle_completed",
            device_id = %device_id,
            cycle_id = cycle_id,
            avg_resistance = avg_resistance,
            avg_voltage = avg_voltage,
            duration_s = duration_s,
            sample_count = sample_count,
            "Discharge cycle completed"
        );
    }

    pub fn log_soh_estimate(
        &self,
        device_id: &str,
        cycle_id: u64,
        soh: f32,
        capacity_ah: f32,
        model_version: &str,
    ) {
        info!(
            event = "soh_estimated",
            device_id = %device_id,
            cycle_id = cycle_id,
            soh = soh,
            capacity_ah = capacity_ah,
            model_version = %model_version,
            "SoH estimate generated"
        );
    }

    pub fn log_alert(&self, device_id: &str, cycle_id: u64, severity: &str, reason: &str) {
        warn!(
            event = "alert_raised",
            device_id = %device_id,
            cycle_id = cycle_id,
            severity = %severity,
            reason = %reason,
            "Maintenance alert raised"
        );
    }

    pub fn log_predictor_unavailable(&self, device_id: &str, cycle_id: u64, reason: &str) {
        warn!(
            event = "predictor_unavailable",
            device_id = %device_id,
            cycle_id = cycle_id,
            reason = %reason,
            "No SoH estimate for completed cycle"
        );
    }
}
