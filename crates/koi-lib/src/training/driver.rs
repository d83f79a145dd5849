//! Offline training of the scaler and both boosted models

use super::dataset::{load_csv, TrainingRow};
use super::metrics::{classification_metrics, regression_metrics, TrainingMetrics};
use super::split::stratified_split;
use crate::artifacts::TrainedArtifacts;
use crate::error::{PipelineError, PipelineResult};
use crate::observability::StructuredLogger;
use crate::predictor::{
    BoostingConfig, FeatureEngineer, FeatureVector, GradientBoostedClassifier,
    GradientBoostedRegressor, Regressor, ScalingParameters, FEATURE_NAMES,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Minimum rows for the classification set and for the regression set
pub const MIN_TRAINING_ROWS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub boosting: BoostingConfig,
    /// Fraction of each class held out for evaluation
    pub test_fraction: f64,
    pub min_rows: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            boosting: BoostingConfig::default(),
            test_fraction: 0.2,
            min_rows: MIN_TRAINING_ROWS,
        }
    }
}

/// Rows that survived filtering, with their engineered features
struct PreparedSet {
    vectors: Vec<FeatureVector>,
    labels: Vec<bool>,
    radii: Vec<Option<f64>>,
}

fn prepare(rows: &[TrainingRow]) -> PreparedSet {
    let engineer = FeatureEngineer::new();
    let mut set = PreparedSet {
        vectors: Vec::with_capacity(rows.len()),
        labels: Vec::with_capacity(rows.len()),
        radii: Vec::with_capacity(rows.len()),
    };
    let mut dropped = 0usize;

    for row in rows {
        // Missing or non-finite required fields fail engineering; such rows are dropped
        match engineer.engineer(&row.raw) {
            Ok(vector) => {
                set.vectors.push(vector);
                set.labels.push(row.is_confirmed());
                set.radii.push(row.radius.filter(|r| r.is_finite()));
            }
            Err(_) => dropped += 1,
        }
    }

    debug!(kept = set.vectors.len(), dropped, "Prepared training rows");
    set
}

/// Fit scaler, classifier and regressor and evaluate them on held-out rows
pub fn train(rows: &[TrainingRow], config: &TrainingConfig) -> PipelineResult<TrainedArtifacts> {
    let set = prepare(rows);
    if set.vectors.len() < config.min_rows {
        return Err(PipelineError::InsufficientData(format!(
            "{} usable rows, need at least {}",
            set.vectors.len(),
            config.min_rows
        )));
    }

    let partition = stratified_split(&set.labels, config.test_fraction, config.boosting.seed);
    let test_positives = partition.test.iter().filter(|&&i| set.labels[i]).count();
    if partition.test.is_empty() || test_positives == 0 || test_positives == partition.test.len() {
        return Err(PipelineError::InsufficientData(
            "held-out partition must contain both dispositions".to_string(),
        ));
    }

    let train_vectors: Vec<FeatureVector> =
        partition.train.iter().map(|&i| set.vectors[i].clone()).collect();
    let scaler = ScalingParameters::fit(&train_vectors)?;
    let scaled = scaler.transform_batch(&set.vectors)?;

    info!(
        train_rows = partition.train.len(),
        test_rows = partition.test.len(),
        estimators = config.boosting.n_estimators,
        "Training classifier"
    );
    let train_rows: Vec<Vec<f64>> = partition.train.iter().map(|&i| scaled[i].clone()).collect();
    let train_labels: Vec<bool> = partition.train.iter().map(|&i| set.labels[i]).collect();
    let classifier = GradientBoostedClassifier::fit(&train_rows, &train_labels, &config.boosting)?;

    let test_labels: Vec<bool> = partition.test.iter().map(|&i| set.labels[i]).collect();
    let test_probs = partition
        .test
        .iter()
        .map(|&i| classifier.predict_proba(&scaled[i]))
        .collect::<PipelineResult<Vec<f64>>>()?;
    let classification = classification_metrics(&test_labels, &test_probs);

    // Regression rows inherit their classification partition
    let regression_idx: Vec<usize> = (0..set.vectors.len())
        .filter(|&i| set.labels[i] && set.radii[i].is_some())
        .collect();
    if regression_idx.len() < config.min_rows {
        return Err(PipelineError::InsufficientData(format!(
            "{} confirmed rows with a radius, need at least {}",
            regression_idx.len(),
            config.min_rows
        )));
    }
    let (reg_test, reg_train): (Vec<usize>, Vec<usize>) =
        regression_idx.iter().partition(|&&i| partition.is_test(i));
    if reg_test.is_empty() {
        return Err(PipelineError::InsufficientData(
            "held-out partition has no confirmed rows with a radius".to_string(),
        ));
    }

    info!(
        train_rows = reg_train.len(),
        test_rows = reg_test.len(),
        "Training regressor"
    );
    let reg_rows: Vec<Vec<f64>> = reg_train.iter().map(|&i| scaled[i].clone()).collect();
    let reg_targets: Vec<f64> = reg_train.iter().filter_map(|&i| set.radii[i]).collect();
    let regressor = GradientBoostedRegressor::fit(&reg_rows, &reg_targets, &config.boosting)?;

    let reg_actual: Vec<f64> = reg_test.iter().filter_map(|&i| set.radii[i]).collect();
    let reg_predicted = reg_test
        .iter()
        .map(|&i| regressor.predict(&scaled[i]).map(|out| out.radius))
        .collect::<PipelineResult<Vec<f64>>>()?;
    let regression = regression_metrics(&reg_actual, &reg_predicted);

    let metrics = TrainingMetrics {
        classification,
        regression,
        train_rows: partition.train.len(),
        test_rows: partition.test.len(),
        regression_train_rows: reg_train.len(),
        regression_test_rows: reg_test.len(),
    };

    let created_at = Utc::now();
    let artifacts = TrainedArtifacts {
        bundle_version: TrainedArtifacts::version_for(&created_at),
        created_at,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        config: config.clone(),
        scaler,
        classifier,
        regressor,
        metrics,
    };

    StructuredLogger::new("koi-training").log_training_completed(&artifacts.bundle_version, &metrics);
    Ok(artifacts)
}

/// Train from a CSV file and write the bundle
///
/// A failed run leaves any existing bundle at `output` untouched.
pub fn train_from_csv(
    data: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &TrainingConfig,
) -> PipelineResult<TrainedArtifacts> {
    let rows = load_csv(data)?;
    let artifacts = train(&rows, config)?;
    artifacts.save(output)?;
    Ok(artifacts)
}
