//! Gradient-boosted planetary radius regressor
//!
//! Squared-loss boosting. Uncertainty is the spread of the ensemble's staged
//! predictions over its final [`UNCERTAINTY_WINDOW`] estimators, computed on
//! every call.

use super::tree::{normalize_importances, subsample_rows, BoostingConfig, RegressionTree};
use super::{Regressor, RegressorOutput};
use crate::error::{PipelineError, PipelineResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of trailing stages whose predictions define the uncertainty
pub const UNCERTAINTY_WINDOW: usize = 50;

/// Smallest radius ever reported, in Earth radii
pub const MIN_RADIUS: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    n_features: usize,
    init_value: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    feature_importances: Vec<f64>,
}

impl GradientBoostedRegressor {
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], config: &BoostingConfig) -> PipelineResult<Self> {
        if rows.len() < 2 || rows.len() != targets.len() {
            return Err(PipelineError::InsufficientData(format!(
                "regressor needs at least 2 matching rows, got {} rows and {} targets",
                rows.len(),
                targets.len()
            )));
        }
        let n = rows.len();
        let n_features = rows[0].len();
        let init_value = targets.iter().sum::<f64>() / n as f64;

        let mut current = vec![init_value; n];
        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(config.n_estimators);
        // Offset keeps the regressor's row draws independent of the classifier's
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));

        for round in 0..config.n_estimators {
            let residuals: Vec<f64> = targets.iter().zip(&current).map(|(t, c)| t - c).collect();
            let sample = subsample_rows(n, config.subsample, &mut rng);

            let mean_residual = |leaf: &[usize]| {
                leaf.iter().map(|&i| residuals[i]).sum::<f64>() / leaf.len() as f64
            };
            let tree = RegressionTree::fit(
                rows,
                &residuals,
                &sample,
                config,
                &mut importances,
                &mean_residual,
            );

            for (value, row) in current.iter_mut().zip(rows) {
                *value += config.learning_rate * tree.predict(row);
            }
            trees.push(tree);

            if (round + 1) % 50 == 0 {
                debug!(round = round + 1, "Regressor boosting progress");
            }
        }

        normalize_importances(&mut importances);

        Ok(Self {
            n_features,
            init_value,
            learning_rate: config.learning_rate,
            trees,
            feature_importances: importances,
        })
    }

    /// Ensemble prediction after each added tree
    pub fn staged_predict(&self, scaled: &[f64]) -> PipelineResult<Vec<f64>> {
        self.check_dimension(scaled)?;
        let mut value = self.init_value;
        Ok(self
            .trees
            .iter()
            .map(|tree| {
                value += self.learning_rate * tree.predict(scaled);
                value
            })
            .collect())
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn is_consistent(&self) -> bool {
        self.feature_importances.len() == self.n_features
            && self
                .trees
                .iter()
                .all(|t| t.is_well_formed() && t.max_feature().map_or(true, |f| f < self.n_features))
    }

    fn check_dimension(&self, scaled: &[f64]) -> PipelineResult<()> {
        if scaled.len() != self.n_features {
            return Err(PipelineError::DimensionMismatch {
                expected: self.n_features,
                actual: scaled.len(),
            });
        }
        Ok(())
    }
}

impl Regressor for GradientBoostedRegressor {
    fn predict(&self, scaled: &[f64]) -> PipelineResult<RegressorOutput> {
        let stages = self.staged_predict(scaled)?;
        let final_value = stages.last().copied().unwrap_or(self.init_value);
        let window = &stages[stages.len().saturating_sub(UNCERTAINTY_WINDOW)..];

        Ok(RegressorOutput {
            radius: final_value.max(MIN_RADIUS),
            uncertainty: population_std(window),
        })
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
