//! HTTP API for predictions, history, statistics, catalog exploration,
//! health and metrics

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use koi_lib::{
    catalog::{Catalog, ExplorePage, ExploreQuery},
    health::{components, ComponentStatus, HealthRegistry},
    history::{PredictionLog, PredictionRecord, PredictionStatistics},
    models::{Disposition, FeatureImportance, PredictionResult, RawField, RawObservation},
    observability::{PipelineMetrics, StructuredLogger},
    predictor::InferenceEngine,
    training::TrainingMetrics,
    PipelineError,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Number of features reported by the statistics endpoint
const TOP_FEATURES: usize = 10;

/// Shared application state
pub struct AppState {
    pub engine: InferenceEngine,
    pub log: Mutex<PredictionLog>,
    pub model_metrics: Option<TrainingMetrics>,
    /// KOI table behind the explorer; `None` when no catalog file was found
    pub catalog: Option<Catalog>,
    pub health_registry: HealthRegistry,
    pub metrics: PipelineMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    /// Register components and mark the server ready when models are loaded
    pub async fn build(
        engine: InferenceEngine,
        log: PredictionLog,
        model_metrics: Option<TrainingMetrics>,
        catalog: Option<Catalog>,
    ) -> Arc<Self> {
        let health_registry = HealthRegistry::new();
        health_registry.register(components::PREDICTION_LOG).await;
        health_registry.register(components::INFERENCE).await;

        let metrics = PipelineMetrics::new();
        match engine.model_version() {
            Some(version) => {
                health_registry.register(components::ARTIFACTS).await;
                metrics.set_artifact_version(version);
                health_registry.set_ready(version).await;
            }
            None => {
                health_registry
                    .set_unhealthy(components::ARTIFACTS, "no artifact bundle loaded")
                    .await;
            }
        }

        Arc::new(Self {
            engine,
            log: Mutex::new(log),
            model_metrics,
            catalog,
            health_registry,
            metrics,
            logger: StructuredLogger::new("koi-server"),
        })
    }
}

/// Error body returned by the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

pub enum ApiError {
    Pipeline(PipelineError),
    NotFound(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Pipeline(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: message,
                    field: None,
                },
            ),
            ApiError::Pipeline(err) => {
                let status = match &err {
                    PipelineError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                    PipelineError::ModelNotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (
                    status,
                    ErrorBody {
                        error: err.to_string(),
                        field: err.field().map(str::to_string),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiHealth {
    pub status: String,
    pub message: String,
}

async fn api_health() -> Json<ApiHealth> {
    Json(ApiHealth {
        status: "ok".to_string(),
        message: "Stellar Verification API is running".to_string(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureInfo {
    pub name: String,
    pub alias: String,
    pub description: String,
    pub min: f64,
    pub max: f64,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
}

async fn features() -> Json<Vec<FeatureInfo>> {
    Json(
        RawField::ALL
            .iter()
            .map(|field| {
                let (min, max) = field.valid_range();
                FeatureInfo {
                    name: field.name().to_string(),
                    alias: field.alias().to_string(),
                    description: field.description().to_string(),
                    min,
                    max,
                    required: field.is_required(),
                    default: field.default_value(),
                }
            })
            .collect(),
    )
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Prediction log id; absent when the log could not be written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub result: PredictionResult,
}

/// Parse, validate and run one observation, recording metrics either way
fn run_inference(state: &AppState, body: &[u8]) -> Result<(RawObservation, PredictionResult), ApiError> {
    let outcome = serde_json::from_slice(body)
        .map_err(|e| PipelineError::invalid("body", format!("malformed JSON: {}", e)))
        .and_then(|value| RawObservation::from_json(&value))
        .and_then(|raw| state.engine.predict(&raw).map(|result| (raw, result)));

    match outcome {
        Ok((raw, result)) => {
            state
                .metrics
                .observe_prediction_latency(result.latency_ms / 1000.0);
            state
                .metrics
                .inc_predictions_served(result.classification.label);
            Ok((raw, result))
        }
        Err(err) => {
            if err.is_client_error() {
                state.metrics.inc_invalid_inputs();
                state.logger.log_rejection(err.field(), &err.to_string());
            } else {
                state.metrics.inc_prediction_errors();
                warn!(error = %err, "Prediction failed");
            }
            Err(err.into())
        }
    }
}

async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    let (raw, result) = run_inference(&state, &body)?;

    let id = match state.log.lock().await.append(raw, &result) {
        Ok(record) => Some(record.id),
        Err(e) => {
            warn!(error = %e, "Failed to record prediction");
            state
                .health_registry
                .set_degraded(components::PREDICTION_LOG, e.to_string())
                .await;
            None
        }
    };

    let version = state.engine.model_version().unwrap_or("unknown");
    state.logger.log_prediction(id.unwrap_or(0), &result, version);

    Ok(Json(PredictResponse { id, result }))
}

async fn list_predictions(State(state): State<Arc<AppState>>) -> Json<Vec<PredictionRecord>> {
    let records = state.log.lock().await.list();
    Json(records)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub removed: usize,
}

async fn reset_predictions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResetResponse>, ApiError> {
    let outcome = state.log.lock().await.reset();
    let removed = outcome?;
    state
        .health_registry
        .set_healthy(components::PREDICTION_LOG)
        .await;
    Ok(Json(ResetResponse { removed }))
}

async fn get_prediction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<PredictionRecord>, ApiError> {
    let record = state.log.lock().await.get(id).cloned();
    record
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("prediction {} not found", id)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatisticsResponse {
    #[serde(flatten)]
    pub summary: PredictionStatistics,
    pub feature_importance: Vec<FeatureImportance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_metrics: Option<TrainingMetrics>,
}

async fn statistics(State(state): State<Arc<AppState>>) -> Json<StatisticsResponse> {
    let summary = state.log.lock().await.statistics();
    Json(StatisticsResponse {
        summary,
        feature_importance: state.engine.top_features(TOP_FEATURES),
        model_metrics: state.model_metrics,
    })
}

/// Raw explorer query parameters; malformed numbers are ignored
#[derive(Debug, Default, Deserialize)]
pub struct ExploreParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub disposition: Option<String>,
    pub search: Option<String>,
    pub min_snr: Option<String>,
    pub max_period: Option<String>,
}

impl ExploreParams {
    pub fn into_query(self) -> ExploreQuery {
        fn number<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
            value.as_deref().and_then(|v| v.trim().parse().ok())
        }
        fn text(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        let defaults = ExploreQuery::default();
        ExploreQuery {
            page: number(&self.page).unwrap_or(defaults.page),
            per_page: number(&self.per_page).unwrap_or(defaults.per_page),
            min_snr: number(&self.min_snr),
            max_period: number(&self.max_period),
            sort: text(self.sort).unwrap_or(defaults.sort),
            descending: self.dir.as_deref() == Some("desc"),
            disposition: text(self.disposition),
            search: text(self.search),
        }
    }
}

async fn explore(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExploreParams>,
) -> Result<Json<ExplorePage>, ApiError> {
    let catalog = state
        .catalog
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("dataset not found".to_string()))?;
    Ok(Json(catalog.explore(&params.into_query())))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub label: Disposition,
    pub confidence: f64,
    pub radius: f64,
    pub latency_ms: f64,
}

/// Classify one catalog row without recording it in the prediction log
async fn explore_classify(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ClassifyResponse>, ApiError> {
    let (_, result) = run_inference(&state, &body)?;
    Ok(Json(ClassifyResponse {
        label: result.classification.label,
        confidence: result.classification.confidence,
        radius: result.regression.planetary_radius,
        latency_ms: result.latency_ms,
    }))
}

/// Liveness: 200 while healthy or degraded, 503 when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(api_health))
        .route("/api/features", get(features))
        .route("/api/predict", post(predict))
        .route(
            "/api/predictions",
            get(list_predictions).delete(reset_predictions),
        )
        .route("/api/predictions/:id", get(get_prediction))
        .route("/api/statistics", get(statistics))
        .route("/api/explore", get(explore))
        .route("/api/explore/classify", post(explore_classify))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server, returning once `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
