//! Prediction output formatting
//!
//! Converts raw model outputs into the public [`PredictionResult`] with
//! derived confidence and fixed rounding.

use super::{ClassifierOutput, RegressorOutput};
use crate::models::{
    ClassProbabilities, ClassificationOutput, PredictionResult, RegressionOutput,
};
use std::time::Duration;

/// Decimal places kept for probabilities, radius and uncertainty
pub const VALUE_DECIMALS: i32 = 4;

/// Decimal places kept for latency in milliseconds
pub const LATENCY_DECIMALS: i32 = 1;

/// Assembles the combined classification and regression result
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter;

impl OutputFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(
        &self,
        classification: ClassifierOutput,
        regression: RegressorOutput,
        elapsed: Duration,
    ) -> PredictionResult {
        let p = classification.probability_confirmed.clamp(0.0, 1.0);

        PredictionResult {
            classification: ClassificationOutput {
                label: classification.label,
                confidence: round_to(p.max(1.0 - p), VALUE_DECIMALS),
                probabilities: ClassProbabilities {
                    confirmed: round_to(p, VALUE_DECIMALS),
                    false_positive: round_to(1.0 - p, VALUE_DECIMALS),
                },
            },
            regression: RegressionOutput {
                planetary_radius: round_to(regression.radius, VALUE_DECIMALS),
                uncertainty: round_to(regression.uncertainty.max(0.0), VALUE_DECIMALS),
            },
            latency_ms: round_to(elapsed.as_secs_f64() * 1000.0, LATENCY_DECIMALS),
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
