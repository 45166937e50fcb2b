//! Sample ingestion and validation
//!
//! Normalizes one raw telemetry record into a [`TelemetrySample`]. Records
//! with non-finite measurements or a negative cycle id are rejected with
//! [`IngestError::MalformedSample`]; the caller drops and counts them rather
//! than forwarding.

use crate::error::IngestError;
use crate::models::TelemetrySample;
use serde::{Deserialize, Serialize};

/// Wire-format telemetry record as published by the vehicle simulator.
///
/// Field names follow the published JSON payload (`temp`, `timestamp_s`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTelemetry {
    pub device_id: String,
    pub cycle_id: i64,
    #[serde(default)]
    pub step: u64,
    pub voltage: f64,
    pub current: f64,
    #[serde(rename = "temp")]
    pub temperature: f64,
    pub internal_resistance: f64,
    pub timestamp_s: f64,
}

/// Validates raw telemetry records. No side effects beyond validation.
#[derive(Debug, Default)]
pub struct SampleIngestor;

impl SampleIngestor {
    pub fn new() -> Self {
        Self
    }

    /// Validate and normalize one record.
    pub fn ingest(&self, raw: RawTelemetry) -> Result<TelemetrySample, IngestError> {
        if raw.device_id.is_empty() {
            return Err(IngestError::MalformedSample {
                reason: "empty device_id".to_string(),
            });
        }

        if raw.cycle_id < 0 {
            return Err(IngestError::MalformedSample {
                reason: format!("negative cycle_id {}", raw.cycle_id),
            });
        }

        for (name, value) in [
            ("voltage", raw.voltage),
            ("current", raw.current),
            ("temp", raw.temperature),
            ("internal_resistance", raw.internal_resistance),
            ("timestamp_s", raw.timestamp_s),
        ] {
            if !value.is_finite() {
                return Err(IngestError::MalformedSample {
                    reason: format!("non-finite {name}: {value}"),
                });
            }
        }

        Ok(TelemetrySample {
            device_id: raw.device_id,
            cycle_id: raw.cycle_id as u64,
            step: raw.step,
            timestamp_s: raw.timestamp_s,
            voltage: raw.voltage,
            current: raw.current,
            temperature: raw.temperature,
            internal_resistance: raw.internal_resistance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(device_id: &str, cycle_id: i64) -> RawTelemetry {
        RawTelemetry {
            device_id: device_id.to_string(),
            cycle_id,
            step: 0,
            voltage: 3.7,
            current: 1.5,
            temperature: 24.0,
            internal_resistance: 0.11,
            timestamp_s: 12.5,
        }
    }

    #[test]
    fn test_valid_sample_passes() {
        let sample = SampleIngestor::new().ingest(raw("B0005", 3)).unwrap();
        assert_eq!(sample.device_id, "B0005");
        assert_eq!(sample.cycle_id, 3);
        assert_eq!(sample.voltage, 3.7);
    }

    #[test]
    fn test_negative_cycle_id_rejected() {
        let err = SampleIngestor::new().ingest(raw("B0005", -1)).unwrap_err();
        assert!(err.to_string().contains("negative cycle_id"));
    }

    #[test]
    fn test_empty_device_id_rejected() {
        let err = SampleIngestor::new().ingest(raw("", 0)).unwrap_err();
        assert!(err.to_string().contains("device_id"));
    }

    #[test]
    fn test_non_finite_fields_rejected() {
        for field in ["voltage", "current", "temp", "internal_resistance", "timestamp_s"] {
            let mut r = raw("B0005", 1);
            match field {
                "voltage" => r.voltage = f64::NAN,
                "current" => r.current = f64::INFINITY,
                "temp" => r.temperature = f64::NEG_INFINITY,
                "internal_resistance" => r.internal_resistance = f64::NAN,
                _ => r.timestamp_s = f64::NAN,
            }
            let err = SampleIngestor::new().ingest(r).unwrap_err();
            assert!(err.to_string().contains(field), "expected {field} in: {err}");
        }
    }

    #[test]
    fn test_wire_format_field_names() {
        let json = r#"{
            "device_id": "B0005",
            "cycle_id": 1,
            "step": 42,
            "voltage": 3.62,
            "current": 1.98,
            "internal_resistance": 1.83,
            "temp": 31.2,
            "timestamp_s": 101.4
        }"#;
        let raw: RawTelemetry = serde_json::from_str(json).unwrap();
        assert_eq!(raw.temperature, 31.2);
        let sample = SampleIngestor::new().ingest(raw).unwrap();
        assert_eq!(sample.step, 42);
        assert_eq!(sample.temperature, 31.2);
    }
}
