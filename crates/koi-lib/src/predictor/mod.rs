//! Feature engineering, scaling and the boosted models

mod classifier;
mod features;
mod inference;
mod output;
mod regressor;
mod scaler;
mod tree;

pub use classifier::{label_for, GradientBoostedClassifier, DECISION_THRESHOLD};
pub use features::{
    period_duration_ratio, stellar_density, FeatureEngineer, FeatureVector, DEGENERATE_SENTINEL,
    FEATURE_NAMES, NUM_FEATURES,
};
pub use inference::{InferenceEngine, InferenceStats, LoadedModels};
pub use output::{round_to, OutputFormatter};
pub use regressor::{GradientBoostedRegressor, MIN_RADIUS, UNCERTAINTY_WINDOW};
pub use scaler::ScalingParameters;
pub use tree::{BoostingConfig, RegressionTree};

use crate::error::PipelineResult;
use crate::models::Disposition;

/// Raw classifier output before formatting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierOutput {
    pub label: Disposition,
    pub probability_confirmed: f64,
}

/// Raw regressor output before formatting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressorOutput {
    pub radius: f64,
    pub uncertainty: f64,
}

/// Disposition model over scaled feature vectors
pub trait Classifier: Send + Sync {
    fn predict(&self, scaled: &[f64]) -> PipelineResult<ClassifierOutput>;

    /// Normalized importances in feature order
    fn feature_importances(&self) -> &[f64];
}

/// Planetary radius model over scaled feature vectors
pub trait Regressor: Send + Sync {
    fn predict(&self, scaled: &[f64]) -> PipelineResult<RegressorOutput>;
}
