//! Agent configuration

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use twin_lib::pipeline::PipelineConfig;

/// Agent configuration, loaded from `TWIN_`-prefixed environment variables
/// with sensible defaults for a single-battery deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Listen address for the newline-delimited JSON telemetry feed.
    #[serde(default = "default_telemetry_addr")]
    pub telemetry_addr: String,

    /// API server port for health/metrics.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// SoH fraction below which a maintenance alert escalates to warning.
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f32,

    /// Rated capacity of a new cell, in Ah.
    #[serde(default = "default_reference_capacity_ah")]
    pub reference_capacity_ah: f32,

    /// Path to the ONNX capacity model. The heuristic model is used when
    /// unset.
    #[serde(default)]
    pub model_path: Option<String>,

    /// Bound on a single capacity model call, in milliseconds.
    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,

    /// Bound on concurrently tracked devices.
    #[serde(default = "default_max_devices")]
    pub max_devices: usize,

    /// Depth of the telemetry, per-device, and event channels.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_telemetry_addr() -> String {
    "0.0.0.0:7878".to_string()
}

fn default_api_port() -> u16 {
    8081
}

fn default_alert_threshold() -> f32 {
    twin_lib::DEFAULT_ALERT_THRESHOLD
}

fn default_reference_capacity_ah() -> f32 {
    twin_lib::predictor::DEFAULT_REFERENCE_CAPACITY_AH
}

fn default_inference_timeout_ms() -> u64 {
    100
}

fn default_max_devices() -> usize {
    twin_lib::cycle::DEFAULT_MAX_DEVICES
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            telemetry_addr: default_telemetry_addr(),
            api_port: default_api_port(),
            alert_threshold: default_alert_threshold(),
            reference_capacity_ah: default_reference_capacity_ah(),
            model_path: None,
            inference_timeout_ms: default_inference_timeout_ms(),
            max_devices: default_max_devices(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("TWIN"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }

    /// Derive the pipeline configuration slice of this config.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            alert_threshold: self.alert_threshold,
            reference_capacity_ah: self.reference_capacity_ah,
            inference_timeout: Duration::from_millis(self.inference_timeout_ms),
            max_devices: self.max_devices,
            channel_capacity: self.channel_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.alert_threshold, 0.80);
        assert_eq!(config.reference_capacity_ah, 1.85);
        assert_eq!(config.api_port, 8081);
        assert!(config.model_path.is_none());
    }

    #[test]
    fn test_pipeline_config_mapping() {
        let config = AgentConfig {
            alert_threshold: 0.9,
            inference_timeout_ms: 250,
            max_devices: 8,
            ..AgentConfig::default()
        };
        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.alert_threshold, 0.9);
        assert_eq!(pipeline.inference_timeout, Duration::from_millis(250));
        assert_eq!(pipeline.max_devices, 8);
    }
}
