//! Offline training pipeline

mod dataset;
mod driver;
mod metrics;
mod split;

pub use dataset::{load_csv, read_csv, TrainingRow};
pub use driver::{train, train_from_csv, TrainingConfig, MIN_TRAINING_ROWS};
pub use metrics::{
    classification_metrics, regression_metrics, roc_auc, ClassificationMetrics,
    RegressionMetrics, TrainingMetrics,
};
pub use split::{stratified_split, Partition};
