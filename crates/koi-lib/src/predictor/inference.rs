//! Inference orchestration
//!
//! Runs validate, engineer, scale, classify, regress and assemble for one
//! observation against an immutable set of loaded models.

use super::features::{FeatureEngineer, FEATURE_NAMES};
use super::output::{round_to, OutputFormatter};
use super::scaler::ScalingParameters;
use super::{Classifier, Regressor};
use crate::artifacts::TrainedArtifacts;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{FeatureImportance, PredictionResult, RawObservation};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Maximum inference latency before warning (5ms target)
const MAX_INFERENCE_MS: u128 = 5;

/// Scaler and both models, shared read-only between requests
pub struct LoadedModels {
    pub version: String,
    pub scaler: ScalingParameters,
    pub classifier: Arc<dyn Classifier>,
    pub regressor: Arc<dyn Regressor>,
}

impl From<TrainedArtifacts> for LoadedModels {
    fn from(artifacts: TrainedArtifacts) -> Self {
        Self {
            version: artifacts.bundle_version,
            scaler: artifacts.scaler,
            classifier: Arc::new(artifacts.classifier),
            regressor: Arc::new(artifacts.regressor),
        }
    }
}

/// Serving-side prediction engine
pub struct InferenceEngine {
    engineer: FeatureEngineer,
    models: Option<Arc<LoadedModels>>,
    output_formatter: OutputFormatter,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
    rejected_count: AtomicU64,
}

impl InferenceEngine {
    /// Engine with no models; every prediction fails with `ModelNotLoaded`
    pub fn new_without_models() -> Self {
        Self::with_models(None)
    }

    pub fn new(models: LoadedModels) -> Self {
        Self::with_models(Some(Arc::new(models)))
    }

    pub fn from_artifacts(artifacts: TrainedArtifacts) -> Self {
        Self::new(LoadedModels::from(artifacts))
    }

    /// Load a bundle from disk; any integrity failure surfaces as `ModelNotLoaded`
    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let artifacts = TrainedArtifacts::load(path).map_err(|e| {
            PipelineError::ModelNotLoaded(format!("{}: {}", path.display(), e))
        })?;
        info!(
            path = %path.display(),
            version = %artifacts.bundle_version,
            "Loaded artifact bundle"
        );
        Ok(Self::from_artifacts(artifacts))
    }

    fn with_models(models: Option<Arc<LoadedModels>>) -> Self {
        Self {
            engineer: FeatureEngineer::new(),
            models,
            output_formatter: OutputFormatter::new(),
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.models.is_some()
    }

    pub fn model_version(&self) -> Option<&str> {
        self.models.as_deref().map(|m| m.version.as_str())
    }

    fn loaded(&self) -> PipelineResult<&LoadedModels> {
        self.models
            .as_deref()
            .ok_or_else(|| PipelineError::ModelNotLoaded("no artifact bundle loaded".to_string()))
    }

    /// Validate, engineer and scale a raw observation
    pub fn preprocess(&self, raw: &RawObservation) -> PipelineResult<Vec<f64>> {
        if let Err(e) = self.engineer.validate(raw) {
            self.rejected_count.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }
        let models = self.loaded()?;
        let features = self.engineer.engineer(raw)?;
        debug!(features = features.len(), "Engineered features");
        models.scaler.transform(features.as_slice())
    }

    /// Full prediction for one observation
    pub fn predict(&self, raw: &RawObservation) -> PipelineResult<PredictionResult> {
        let start = Instant::now();

        let scaled = self.preprocess(raw)?;
        let models = self.loaded()?;

        let classification = models.classifier.predict(&scaled)?;
        let regression = models.regressor.predict(&scaled)?;

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(self.output_formatter.format(classification, regression, elapsed))
    }

    /// Classifier importances in feature order
    pub fn feature_importances(&self) -> PipelineResult<Vec<FeatureImportance>> {
        let models = self.loaded()?;
        Ok(FEATURE_NAMES
            .iter()
            .zip(models.classifier.feature_importances())
            .map(|(name, importance)| FeatureImportance {
                feature: name.to_string(),
                importance: *importance,
            })
            .collect())
    }

    /// Highest `n` importances with display names, as percentages
    pub fn top_features(&self, n: usize) -> Vec<FeatureImportance> {
        let mut ranked = self.feature_importances().unwrap_or_default();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked
            .into_iter()
            .take(n)
            .map(|f| FeatureImportance {
                feature: display_name(&f.feature),
                importance: round_to(f.importance * 100.0, 2),
            })
            .collect()
    }

    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
            rejected_inputs: self.rejected_count.load(Ordering::Relaxed),
        }
    }
}

/// Inference statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
    pub rejected_inputs: u64,
}

fn display_name(feature: &str) -> String {
    feature.trim_start_matches("koi_").replace('_', " ")
}
