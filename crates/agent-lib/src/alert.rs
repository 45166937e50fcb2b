//! Maintenance alert evaluation
//!
//! Thresholds a SoH estimate into an [`AlertDecision`]. Each cycle is
//! judged independently: there is no hysteresis or debouncing across
//! cycles, so an estimate oscillating around the threshold flips the
//! severity every cycle. That is a deliberate simplicity trade-off;
//! consumers needing debounce apply it downstream.

use crate::models::SoHEstimate;
use serde::{Deserialize, Serialize};

/// Default SoH fraction below which maintenance is flagged.
pub const DEFAULT_ALERT_THRESHOLD: f32 = 0.80;

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    None,
    Warning,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::None => write!(f, "none"),
            AlertSeverity::Warning => write!(f, "warning"),
        }
    }
}

/// Per-cycle maintenance decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDecision {
    pub device_id: String,
    pub cycle_id: u64,
    pub severity: AlertSeverity,
    pub soh: f32,
    pub reason: String,
}

/// Thresholds SoH estimates. Severity is WARNING exactly when
/// `soh < threshold` (strict comparison, so an estimate equal to the
/// threshold stays at NONE, and a NaN from a degenerate model compares
/// false and stays at NONE as well).
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    threshold: f32,
}

impl AlertEvaluator {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn evaluate(&self, estimate: &SoHEstimate) -> AlertDecision {
        let (severity, reason) = if estimate.soh < self.threshold {
            (
                AlertSeverity::Warning,
                format!(
                    "SoH {:.1}% below maintenance threshold {:.1}%, schedule battery service",
                    estimate.soh * 100.0,
                    self.threshold * 100.0
                ),
            )
        } else {
            (
                AlertSeverity::None,
                format!(
                    "SoH {:.1}% at or above maintenance threshold {:.1}%",
                    estimate.soh * 100.0,
                    self.threshold * 100.0
                ),
            )
        };

        AlertDecision {
            device_id: estimate.device_id.clone(),
            cycle_id: estimate.cycle_id,
            severity,
            soh: estimate.soh,
            reason,
        }
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(soh: f32) -> SoHEstimate {
        SoHEstimate {
            device_id: "B0005".to_string(),
            cycle_id: 12,
            soh,
            capacity_ah: soh * 1.85,
            model_version: "v1".to_string(),
            computed_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_soh_below_threshold_warns() {
        let decision = AlertEvaluator::new(0.80).evaluate(&estimate(0.75));
        assert_eq!(decision.severity, AlertSeverity::Warning);
        assert!(decision.reason.contains("75.0%"));
        assert!(decision.reason.contains("80.0%"));
        assert_eq!(decision.device_id, "B0005");
        assert_eq!(decision.cycle_id, 12);
    }

    #[test]
    fn test_soh_equal_to_threshold_is_none() {
        // Strict `<`: exactly at the threshold does not escalate.
        let decision = AlertEvaluator::new(0.80).evaluate(&estimate(0.80));
        assert_eq!(decision.severity, AlertSeverity::None);
    }

    #[test]
    fn test_soh_just_below_threshold_warns() {
        let decision = AlertEvaluator::new(0.80).evaluate(&estimate(0.79));
        assert_eq!(decision.severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let decision = AlertEvaluator::new(0.90).evaluate(&estimate(0.85));
        assert_eq!(decision.severity, AlertSeverity::Warning);

        let decision = AlertEvaluator::new(0.50).evaluate(&estimate(0.85));
        assert_eq!(decision.severity, AlertSeverity::None);
    }

    #[test]
    fn test_nan_soh_does_not_warn() {
        // NaN compares false against any threshold; the degenerate estimate
        // passes through with severity NONE and stays visible in the reason.
        let decision = AlertEvaluator::new(0.80).evaluate(&estimate(f32::NAN));
        assert_eq!(decision.severity, AlertSeverity::None);
        assert!(decision.soh.is_nan());
    }

    #[test]
    fn test_no_hysteresis_between_cycles() {
        let evaluator = AlertEvaluator::new(0.80);
        // Oscillating estimates flip severity every time; decisions carry no
        // memory of the previous cycle.
        assert_eq!(
            evaluator.evaluate(&estimate(0.79)).severity,
            AlertSeverity::Warning
        );
        assert_eq!(
            evaluator.evaluate(&estimate(0.81)).severity,
            AlertSeverity::None
        );
        assert_eq!(
            evaluator.evaluate(&estimate(0.79)).severity,
            AlertSeverity::Warning
        );
    }

    #[test]
    fn test_severity_serde_rename() {
        let json = serde_json::to_string(&AlertSeverity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
        assert_eq!(AlertSeverity::Warning.to_string(), "warning");
    }
}
