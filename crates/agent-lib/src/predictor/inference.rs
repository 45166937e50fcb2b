//! ONNX inference using tract
//!
//! Runs the offline-trained capacity regression model (exported to ONNX)
//! with tract, keeping the agent free of a native ONNX Runtime install. A
//! heuristic model stands in when no artifact is configured.

use super::SohModel;
use crate::models::CycleFeatures;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Number of input features expected by the model:
/// [avg_resistance, duration_s, avg_voltage].
const NUM_FEATURES: usize = 3;

/// Inference latency target; slower calls are counted and warned about.
const MAX_INFERENCE_MS: u128 = 5;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Capacity model backed by an ONNX artifact.
pub struct OnnxSohModel {
    model: TractModel,
    version: String,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl std::fmt::Debug for OnnxSohModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSohModel")
            .field("version", &self.version)
            .field("inference_count", &self.inference_count)
            .field("slow_inference_count", &self.slow_inference_count)
            .finish_non_exhaustive()
    }
}

impl OnnxSohModel {
    /// Load an artifact from disk. The file stem doubles as the version
    /// label (e.g. `battery_model_rf_v3.onnx` -> `battery_model_rf_v3`).
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read model artifact {}", path.display()))?;
        let version = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        Self::from_bytes(&bytes, version)
    }

    /// Parse and optimize an ONNX model from bytes.
    pub fn from_bytes(model_bytes: &[u8], version: String) -> Result<Self> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;

        Ok(Self {
            model,
            version,
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        })
    }

    fn features_to_tensor(features: &CycleFeatures) -> Tensor {
        let data = features.to_model_input().to_vec();
        tract_ndarray::Array2::from_shape_vec((1, NUM_FEATURES), data)
            .unwrap()
            .into()
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }
}

impl SohModel for OnnxSohModel {
    fn predict(&self, features: &CycleFeatures) -> Result<f32> {
        let start = Instant::now();

        let input = Self::features_to_tensor(features);
        let result = self.model.run(tvec!(input.into()))?;
        let output = result.get(0).context("No output from model")?;
        let capacity_ah = *output
            .to_array_view::<f32>()?
            .iter()
            .next()
            .context("Empty model output")?;

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target", MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(capacity_ah)
    }

    fn version(&self) -> String {
        self.version.clone()
    }
}

/// Inference statistics
#[derive(Debug, Clone)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}

/// Nominal discharge duration of a healthy cell at rated load, in seconds.
const NOMINAL_DISCHARGE_S: f64 = 3600.0;

/// Nominal internal resistance of a healthy cell, in ohms.
const NOMINAL_RESISTANCE_OHMS: f64 = 0.1;

/// Heuristic capacity model used when no ONNX artifact is configured.
///
/// Discharge duration tracks deliverable capacity roughly linearly at a
/// constant load, with a penalty for internal resistance above nominal.
/// Deliberately rough; its estimates are tagged with version "heuristic" so
/// downstream consumers can discount them.
pub struct HeuristicSohModel {
    reference_capacity_ah: f32,
}

impl HeuristicSohModel {
    pub fn new(reference_capacity_ah: f32) -> Self {
        Self {
            reference_capacity_ah,
        }
    }
}

impl SohModel for HeuristicSohModel {
    fn predict(&self, features: &CycleFeatures) -> Result<f32> {
        let duration_factor = (features.duration_s / NOMINAL_DISCHARGE_S).clamp(0.0, 1.5);
        let resistance_excess =
            (features.avg_resistance - NOMINAL_RESISTANCE_OHMS) / NOMINAL_RESISTANCE_OHMS;
        let resistance_penalty = (resistance_excess * 0.1).clamp(0.0, 0.5);

        let capacity =
            self.reference_capacity_ah as f64 * duration_factor * (1.0 - resistance_penalty);
        Ok(capacity as f32)
    }

    fn version(&self) -> String {
        "heuristic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(avg_resistance: f64, duration_s: f64) -> CycleFeatures {
        CycleFeatures {
            avg_resistance,
            avg_voltage: 3.6,
            duration_s,
            sample_count: 10,
        }
    }

    #[test]
    fn test_invalid_artifact_rejected() {
        let err = OnnxSohModel::from_bytes(b"not an onnx model", "bad".to_string()).unwrap_err();
        assert!(err.to_string().contains("parse ONNX model"));
    }

    #[test]
    fn test_missing_artifact_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.onnx");
        let err = OnnxSohModel::from_path(&path).unwrap_err();
        assert!(err.to_string().contains("read model artifact"));
    }

    #[test]
    fn test_heuristic_is_deterministic() {
        let model = HeuristicSohModel::new(1.85);
        let f = features(0.1, 1800.0);
        assert_eq!(model.predict(&f).unwrap(), model.predict(&f).unwrap());
    }

    #[test]
    fn test_heuristic_full_duration_at_nominal_resistance() {
        let model = HeuristicSohModel::new(1.85);
        let capacity = model.predict(&features(0.1, 3600.0)).unwrap();
        assert!((capacity - 1.85).abs() < 1e-6);
    }

    #[test]
    fn test_heuristic_degrades_with_shorter_discharge() {
        let model = HeuristicSohModel::new(1.85);
        let full = model.predict(&features(0.1, 3600.0)).unwrap();
        let faded = model.predict(&features(0.1, 1800.0)).unwrap();
        assert!(faded < full);
    }

    #[test]
    fn test_heuristic_penalizes_high_resistance() {
        let model = HeuristicSohModel::new(1.85);
        let healthy = model.predict(&features(0.1, 3600.0)).unwrap();
        let resistive = model.predict(&features(0.3, 3600.0)).unwrap();
        assert!(resistive < healthy);
    }

    #[test]
    fn test_heuristic_version_label() {
        assert_eq!(HeuristicSohModel::new(1.85).version(), "heuristic");
    }
}
