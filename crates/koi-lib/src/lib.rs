//! Kepler Object of Interest vetting library
//!
//! This crate provides the core functionality for:
//! - Feature engineering and standardization of raw KOI observations
//! - Gradient-boosted disposition classification and radius regression
//! - Offline training and checksummed artifact bundles
//! - Prediction history, catalog browsing, health checks and observability

pub mod artifacts;
pub mod catalog;
pub mod error;
pub mod health;
pub mod history;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod training;

pub use artifacts::{TrainedArtifacts, FORMAT_VERSION};
pub use catalog::{Catalog, CatalogEntry, ExplorePage, ExploreQuery};
pub use error::{PipelineError, PipelineResult};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use history::{PredictionLog, PredictionRecord, PredictionStatistics};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use predictor::{FeatureEngineer, InferenceEngine, LoadedModels};
pub use training::{TrainingConfig, TrainingMetrics};
