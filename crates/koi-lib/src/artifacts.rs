//! Trained artifact bundle persistence
//!
//! The bundle is a JSON envelope holding a format version, a SHA-256 checksum
//! and the payload. The checksum covers the exact payload bytes, so loading
//! verifies integrity before any model is deserialized. Writes go to a temp
//! file that is synced and renamed over the target.

use crate::error::{PipelineError, PipelineResult};
use crate::predictor::{
    GradientBoostedClassifier, GradientBoostedRegressor, ScalingParameters, FEATURE_NAMES,
    NUM_FEATURES,
};
use crate::training::{TrainingConfig, TrainingMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Bumped whenever the payload layout changes incompatibly
pub const FORMAT_VERSION: u32 = 1;

/// Everything serving needs, produced by one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedArtifacts {
    pub bundle_version: String,
    pub created_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub config: TrainingConfig,
    pub scaler: ScalingParameters,
    pub classifier: GradientBoostedClassifier,
    pub regressor: GradientBoostedRegressor,
    pub metrics: TrainingMetrics,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    checksum: String,
    bundle: Box<RawValue>,
}

impl TrainedArtifacts {
    /// Version label derived from the creation time
    pub fn version_for(created_at: &DateTime<Utc>) -> String {
        format!("v{}", created_at.format("%Y%m%d%H%M%S"))
    }

    /// Write the bundle atomically, returning the payload checksum
    pub fn save(&self, path: impl AsRef<Path>) -> PipelineResult<String> {
        let path = path.as_ref();
        let payload = serde_json::to_string(self)?;
        let checksum = compute_checksum(payload.as_bytes());
        let envelope = Envelope {
            format_version: FORMAT_VERSION,
            checksum: checksum.clone(),
            bundle: RawValue::from_string(payload)?,
        };
        let encoded = serde_json::to_vec(&envelope)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;

        info!(
            path = %path.display(),
            version = %self.bundle_version,
            checksum = %checksum,
            size = encoded.len(),
            "Artifact bundle written"
        );
        Ok(checksum)
    }

    /// Read and verify a bundle
    pub fn load(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::Artifact(format!("malformed bundle envelope: {}", e)))?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(PipelineError::Artifact(format!(
                "unsupported format version {}, expected {}",
                envelope.format_version, FORMAT_VERSION
            )));
        }

        let computed = compute_checksum(envelope.bundle.get().as_bytes());
        if computed != envelope.checksum {
            return Err(PipelineError::Artifact(format!(
                "checksum mismatch: expected {}, got {}",
                envelope.checksum, computed
            )));
        }

        let artifacts: TrainedArtifacts = serde_json::from_str(envelope.bundle.get())
            .map_err(|e| PipelineError::Artifact(format!("malformed bundle payload: {}", e)))?;
        artifacts.validate()?;

        debug!(path = %path.display(), checksum = %computed, "Artifact bundle verified");
        Ok(artifacts)
    }

    /// Feature order and model dimensions must match this build
    pub fn validate(&self) -> PipelineResult<()> {
        if self.feature_names != FEATURE_NAMES || self.scaler.feature_names != FEATURE_NAMES {
            return Err(PipelineError::Artifact(
                "feature order does not match the serving feature order".to_string(),
            ));
        }
        if self.scaler.len() != NUM_FEATURES || self.scaler.std.len() != NUM_FEATURES {
            return Err(PipelineError::DimensionMismatch {
                expected: NUM_FEATURES,
                actual: self.scaler.len(),
            });
        }
        if self.classifier.n_features() != NUM_FEATURES {
            return Err(PipelineError::DimensionMismatch {
                expected: NUM_FEATURES,
                actual: self.classifier.n_features(),
            });
        }
        if self.regressor.n_features() != NUM_FEATURES {
            return Err(PipelineError::DimensionMismatch {
                expected: NUM_FEATURES,
                actual: self.regressor.n_features(),
            });
        }
        if !self.classifier.is_consistent() || !self.regressor.is_consistent() {
            return Err(PipelineError::Artifact(
                "model trees are malformed or reference unknown features".to_string(),
            ));
        }
        Ok(())
    }
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
