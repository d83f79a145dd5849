//! Observability infrastructure for the vetting pipeline
//!
//! Provides:
//! - Prometheus metrics (prediction latency, served/rejected counts, artifact version)
//! - Structured JSON logging with tracing

use crate::models::{Disposition, PredictionResult};
use crate::training::TrainingMetrics;
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_served: IntCounterVec,
    invalid_inputs: IntCounter,
    prediction_errors: IntCounter,
    artifact_version_info: GaugeVec,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "koi_prediction_latency_seconds",
                "Time spent running feature engineering and both models",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_served: register_int_counter_vec!(
                "koi_predictions_served_total",
                "Predictions served, by predicted disposition",
                &["label"]
            )
            .expect("Failed to register predictions_served"),

            invalid_inputs: register_int_counter!(
                "koi_invalid_inputs_total",
                "Prediction requests rejected for invalid input"
            )
            .expect("Failed to register invalid_inputs"),

            prediction_errors: register_int_counter!(
                "koi_prediction_errors_total",
                "Prediction requests that failed for reasons other than input"
            )
            .expect("Failed to register prediction_errors"),

            artifact_version_info: register_gauge_vec!(
                "koi_artifact_version_info",
                "Information about the currently loaded artifact bundle",
                &["version"]
            )
            .expect("Failed to register artifact_version_info"),
        }
    }
}

/// Handle to the process-wide pipeline metrics
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions_served(&self, label: Disposition) {
        self.inner()
            .predictions_served
            .with_label_values(&[label.as_str()])
            .inc();
    }

    pub fn predictions_served(&self, label: Disposition) -> u64 {
        self.inner()
            .predictions_served
            .with_label_values(&[label.as_str()])
            .get()
    }

    pub fn inc_invalid_inputs(&self) {
        self.inner().invalid_inputs.inc();
    }

    pub fn invalid_inputs(&self) -> u64 {
        self.inner().invalid_inputs.get()
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    pub fn set_artifact_version(&self, version: &str) {
        self.inner().artifact_version_info.reset();
        self.inner()
            .artifact_version_info
            .with_label_values(&[version])
            .set(1.0);
    }
}

/// Structured logger for pipeline events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_prediction(&self, id: u64, result: &PredictionResult, model_version: &str) {
        info!(
            event = "prediction_served",
            service = %self.service,
            prediction_id = id,
            label = %result.classification.label,
            confidence = result.classification.confidence,
            planetary_radius = result.regression.planetary_radius,
            uncertainty = result.regression.uncertainty,
            latency_ms = result.latency_ms,
            model_version = %model_version,
            "Served prediction"
        );
    }

    pub fn log_rejection(&self, field: Option<&str>, reason: &str) {
        warn!(
            event = "prediction_rejected",
            service = %self.service,
            field = ?field,
            reason = %reason,
            "Rejected prediction request"
        );
    }

    pub fn log_artifacts_loaded(&self, path: &str, version: &str) {
        info!(
            event = "artifacts_loaded",
            service = %self.service,
            path = %path,
            version = %version,
            "Artifact bundle loaded"
        );
    }

    pub fn log_training_completed(&self, version: &str, metrics: &TrainingMetrics) {
        info!(
            event = "training_completed",
            service = %self.service,
            version = %version,
            f1_score = metrics.classification.f1_score,
            roc_auc = metrics.classification.roc_auc,
            rmse = metrics.regression.rmse,
            r2_score = metrics.regression.r2_score,
            train_rows = metrics.train_rows,
            test_rows = metrics.test_rows,
            "Training completed"
        );
    }

    pub fn log_startup(&self, version: &str, model_version: &str, port: u16) {
        info!(
            event = "server_started",
            service = %self.service,
            server_version = %version,
            model_version = %model_version,
            port = port,
            "Vetting server started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            service = %self.service,
            reason = %reason,
            "Vetting server shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_metrics_shared_across_handles() {
        let a = PipelineMetrics::new();
        let b = PipelineMetrics::new();

        let before = b.predictions_served(Disposition::Confirmed);
        a.inc_predictions_served(Disposition::Confirmed);
        assert!(b.predictions_served(Disposition::Confirmed) >= before + 1);

        let invalid_before = b.invalid_inputs();
        a.inc_invalid_inputs();
        assert!(b.invalid_inputs() >= invalid_before + 1);

        a.observe_prediction_latency(0.0004);
        a.set_artifact_version("v20260101000000");
        a.inc_prediction_errors();
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("koi-server");
        assert_eq!(logger.service, "koi-server");
    }
}
