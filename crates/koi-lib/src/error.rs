//! Error taxonomy for the vetting pipeline

use thiserror::Error;

/// Errors raised by feature engineering, inference and training
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or out-of-range raw input. Recoverable; reported to the caller.
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// Trained artifacts are missing or unusable
    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),

    /// Training data too small to fit or evaluate the models
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Feature vector and scaler/model disagree on dimensionality
    #[error("dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Artifact bundle failed integrity or compatibility checks
    #[error("artifact error: {0}")]
    Artifact(String),

    /// Training dataset could not be parsed
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field named by an `InvalidInput` error
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { field, .. } => Some(field),
            _ => None,
        }
    }

    /// True for errors caused by the request rather than the deployment
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput { .. })
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
