//! Standardization of feature vectors
//!
//! Statistics are fitted once on the training partition and stored in the
//! artifact bundle next to the models they were fitted for.

use super::features::{FeatureVector, FEATURE_NAMES, NUM_FEATURES};
use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Per-feature mean and population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingParameters {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ScalingParameters {
    /// Fit on a batch of feature vectors
    ///
    /// Constant columns get a standard deviation of 1.0 so that serving never
    /// divides by zero.
    pub fn fit(rows: &[FeatureVector]) -> PipelineResult<Self> {
        if rows.len() < 2 {
            return Err(PipelineError::InsufficientData(format!(
                "scaler needs at least 2 rows, got {}",
                rows.len()
            )));
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != NUM_FEATURES) {
            return Err(PipelineError::DimensionMismatch {
                expected: NUM_FEATURES,
                actual: bad.len(),
            });
        }

        let n = rows.len() as f64;
        let mut mean = vec![0.0; NUM_FEATURES];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row.as_slice()) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; NUM_FEATURES];
        for row in rows {
            for ((acc, v), m) in var.iter_mut().zip(row.as_slice()).zip(&mean) {
                *acc += (v - m).powi(2);
            }
        }

        let std = var
            .iter()
            .zip(&mean)
            .map(|(acc, m)| {
                let sd = (acc / n).sqrt();
                if sd <= f64::EPSILON * m.abs().max(1.0) {
                    1.0
                } else {
                    sd
                }
            })
            .collect();

        Ok(Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            mean,
            std,
        })
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// `(x - mean) / std` elementwise
    pub fn transform(&self, vector: &[f64]) -> PipelineResult<Vec<f64>> {
        if vector.len() != self.mean.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: self.mean.len(),
                actual: vector.len(),
            });
        }
        Ok(vector
            .iter()
            .zip(&self.mean)
            .zip(&self.std)
            .map(|((x, m), s)| (x - m) / s)
            .collect())
    }

    pub fn transform_batch(&self, rows: &[FeatureVector]) -> PipelineResult<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform(r.as_slice())).collect()
    }
}
