//! Gradient-boosted disposition classifier
//!
//! Binary log-loss boosting over least-squares trees with Newton leaf steps.
//! The raw score is the log-odds of CONFIRMED.

use super::tree::{normalize_importances, subsample_rows, BoostingConfig, RegressionTree};
use super::{Classifier, ClassifierOutput};
use crate::error::{PipelineError, PipelineResult};
use crate::models::Disposition;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Probability above which a candidate is labelled CONFIRMED.
/// Exactly 0.5 resolves to FALSE POSITIVE.
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedClassifier {
    n_features: usize,
    init_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    feature_importances: Vec<f64>,
}

impl GradientBoostedClassifier {
    /// Fit on scaled rows; `labels[i]` is true for CONFIRMED
    pub fn fit(rows: &[Vec<f64>], labels: &[bool], config: &BoostingConfig) -> PipelineResult<Self> {
        if rows.is_empty() || rows.len() != labels.len() {
            return Err(PipelineError::InsufficientData(format!(
                "classifier needs matching rows and labels, got {} rows and {} labels",
                rows.len(),
                labels.len()
            )));
        }
        let n = rows.len();
        let n_features = rows[0].len();
        let positives = labels.iter().filter(|&&l| l).count();
        if positives == 0 || positives == n {
            return Err(PipelineError::InsufficientData(
                "classifier needs both CONFIRMED and FALSE POSITIVE rows".to_string(),
            ));
        }

        let y: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let prior = positives as f64 / n as f64;
        let init_score = (prior / (1.0 - prior)).ln();

        let mut scores = vec![init_score; n];
        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(config.n_estimators);
        let mut rng = StdRng::seed_from_u64(config.seed);

        for round in 0..config.n_estimators {
            let probs: Vec<f64> = scores.iter().map(|&s| sigmoid(s)).collect();
            let residuals: Vec<f64> = y.iter().zip(&probs).map(|(t, p)| t - p).collect();
            let sample = subsample_rows(n, config.subsample, &mut rng);

            let newton_step = |leaf: &[usize]| {
                let numerator: f64 = leaf.iter().map(|&i| residuals[i]).sum();
                let denominator: f64 = leaf.iter().map(|&i| probs[i] * (1.0 - probs[i])).sum();
                if denominator.abs() < 1e-12 {
                    0.0
                } else {
                    numerator / denominator
                }
            };
            let tree = RegressionTree::fit(
                rows,
                &residuals,
                &sample,
                config,
                &mut importances,
                &newton_step,
            );

            for (score, row) in scores.iter_mut().zip(rows) {
                *score += config.learning_rate * tree.predict(row);
            }
            trees.push(tree);

            if (round + 1) % 50 == 0 {
                debug!(round = round + 1, "Classifier boosting progress");
            }
        }

        normalize_importances(&mut importances);

        Ok(Self {
            n_features,
            init_score,
            learning_rate: config.learning_rate,
            trees,
            feature_importances: importances,
        })
    }

    /// Probability of CONFIRMED
    pub fn predict_proba(&self, scaled: &[f64]) -> PipelineResult<f64> {
        if scaled.len() != self.n_features {
            return Err(PipelineError::DimensionMismatch {
                expected: self.n_features,
                actual: scaled.len(),
            });
        }
        let score = self.init_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict(scaled)).sum::<f64>();
        Ok(sigmoid(score))
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    /// Trees referencing features beyond `n_features` indicate a corrupt bundle
    pub fn is_consistent(&self) -> bool {
        self.feature_importances.len() == self.n_features
            && self
                .trees
                .iter()
                .all(|t| t.is_well_formed() && t.max_feature().map_or(true, |f| f < self.n_features))
    }
}

impl Classifier for GradientBoostedClassifier {
    fn predict(&self, scaled: &[f64]) -> PipelineResult<ClassifierOutput> {
        let probability = self.predict_proba(scaled)?;
        Ok(ClassifierOutput {
            label: label_for(probability),
            probability_confirmed: probability,
        })
    }

    fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

/// Threshold a CONFIRMED probability into a label
pub fn label_for(probability_confirmed: f64) -> Disposition {
    if probability_confirmed > DECISION_THRESHOLD {
        Disposition::Confirmed
    } else {
        Disposition::FalsePositive
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
