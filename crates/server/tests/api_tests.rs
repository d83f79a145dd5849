//! Integration tests for the vetting API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use koi_lib::{
    health::components,
    predictor::{
        Classifier, ClassifierOutput, InferenceEngine, LoadedModels, Regressor, RegressorOutput,
        ScalingParameters, FEATURE_NAMES, NUM_FEATURES,
    },
    Catalog, Disposition, PipelineResult, PredictionLog,
};
use koi_server::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Confirms anything with an impact parameter below 0.5
struct ImpactClassifier {
    importances: Vec<f64>,
}

impl Classifier for ImpactClassifier {
    fn predict(&self, scaled: &[f64]) -> PipelineResult<ClassifierOutput> {
        let probability = if scaled[1] < 0.5 { 0.92 } else { 0.15 };
        Ok(ClassifierOutput {
            label: if probability > 0.5 {
                Disposition::Confirmed
            } else {
                Disposition::FalsePositive
            },
            probability_confirmed: probability,
        })
    }

    fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}

struct FixedRegressor;

impl Regressor for FixedRegressor {
    fn predict(&self, _scaled: &[f64]) -> PipelineResult<RegressorOutput> {
        Ok(RegressorOutput {
            radius: 2.5,
            uncertainty: 0.12,
        })
    }
}

fn stub_engine() -> InferenceEngine {
    let mut importances = vec![0.0; NUM_FEATURES];
    importances[1] = 0.7;
    importances[3] = 0.3;
    InferenceEngine::new(LoadedModels {
        version: "v-test".to_string(),
        scaler: ScalingParameters {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            mean: vec![0.0; NUM_FEATURES],
            std: vec![1.0; NUM_FEATURES],
        },
        classifier: Arc::new(ImpactClassifier { importances }),
        regressor: Arc::new(FixedRegressor),
    })
}

const CATALOG: &str = "\
kepid,kepoi_name,koi_disposition,koi_period,koi_impact,koi_duration,koi_depth,koi_model_snr,koi_steff,koi_slogg,koi_srad,koi_smass,koi_smet,koi_prad
10797460,K00752.01,CONFIRMED,9.48,0.146,2.95,615.8,35.8,5455,4.467,0.927,0.919,0.14,2.26
10811496,K00753.01,FALSE POSITIVE,19.89,0.969,1.78,10800,40.9,6031,4.438,1.046,1.095,-0.52,14.6
10848459,K00754.01,FALSE POSITIVE,1.73,1.276,2.40,8079.2,505.6,5805,4.564,0.791,0.836,-0.18,33.46
10854555,K00755.01,CANDIDATE,2.52,0.701,1.65,603.3,,6046,4.438,1.05,1.02,0.0,2.75
";

fn catalog() -> Catalog {
    Catalog::read(CATALOG.as_bytes()).unwrap()
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let state = AppState::build(stub_engine(), PredictionLog::in_memory(), None, Some(catalog())).await;
    (create_router(state.clone()), state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn earth_like() -> Value {
    json!({
        "koi_period": 365.25,
        "koi_impact": 0.3,
        "koi_duration": 13.0,
        "koi_depth": 84,
        "koi_steff": 5778,
        "koi_srad": 1.0,
        "koi_smass": 1.0
    })
}

#[tokio::test]
async fn test_api_health() {
    let (app, _state) = setup_test_app().await;
    let (status, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_features_lists_all_inputs() {
    let (app, _state) = setup_test_app().await;
    let (status, body) = send(&app, get("/api/features")).await;
    assert_eq!(status, StatusCode::OK);

    let features = body.as_array().unwrap();
    assert_eq!(features.len(), 10);
    assert_eq!(features[2]["name"], "koi_duration");
    assert_eq!(features[2]["min"], 0.01);
    let slogg = features.iter().find(|f| f["name"] == "koi_slogg").unwrap();
    assert_eq!(slogg["required"], false);
    assert_eq!(slogg["default"], 4.438);
}

#[tokio::test]
async fn test_predict_success_is_logged() {
    let (app, state) = setup_test_app().await;
    let (status, body) = send(&app, post_json("/api/predict", earth_like())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["classification"]["label"], "CONFIRMED");
    assert_eq!(body["classification"]["confidence"], 0.92);
    assert_eq!(body["classification"]["probabilities"]["false_positive"], 0.08);
    assert_eq!(body["regression"]["planetary_radius"], 2.5);
    assert!(body["latency_ms"].as_f64().unwrap() >= 0.0);

    assert_eq!(state.log.lock().await.len(), 1);
}

#[tokio::test]
async fn test_predict_accepts_numeric_strings_and_aliases() {
    let (app, _state) = setup_test_app().await;
    let (status, body) = send(
        &app,
        post_json(
            "/api/predict",
            json!({
                "period": "10.5",
                "impact": "0.9",
                "duration": 3,
                "depth": "1200",
                "steff": 5200,
                "srad": 0.8,
                "smass": 0.85,
                "model_snr": ""
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["classification"]["label"], "FALSE POSITIVE");
}

#[tokio::test]
async fn test_predict_invalid_input_names_field() {
    let (app, state) = setup_test_app().await;
    let mut input = earth_like();
    input["koi_duration"] = json!(-5);

    let (status, body) = send(&app, post_json("/api/predict", input)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "koi_duration");
    assert!(body["error"].as_str().unwrap().contains("koi_duration"));
    assert!(state.log.lock().await.is_empty());
}

#[tokio::test]
async fn test_predict_non_numeric_and_missing_fields() {
    let (app, _state) = setup_test_app().await;

    let mut input = earth_like();
    input["koi_depth"] = json!("deep");
    let (status, body) = send(&app, post_json("/api/predict", input)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "koi_depth");

    let mut input = earth_like();
    input.as_object_mut().unwrap().remove("koi_smass");
    let (status, body) = send(&app, post_json("/api/predict", input)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "koi_smass");
}

#[tokio::test]
async fn test_predict_malformed_body() {
    let (app, _state) = setup_test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "body");
}

#[tokio::test]
async fn test_predict_without_artifacts_is_unavailable() {
    let state = AppState::build(
        InferenceEngine::new_without_models(),
        PredictionLog::in_memory(),
        None,
        None,
    )
    .await;
    let app = create_router(state);

    let (status, body) = send(&app, post_json("/api/predict", earth_like())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("model not loaded"));

    let (status, _) = send(&app, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_prediction_history_endpoints() {
    let (app, _state) = setup_test_app().await;
    for _ in 0..3 {
        send(&app, post_json("/api/predict", earth_like())).await;
    }

    let (status, body) = send(&app, get("/api/predictions")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<u64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 2, 1]);

    let (status, body) = send(&app, get("/api/predictions/2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input_data"]["koi_period"], 365.25);
    assert_eq!(body["classification_result"], "CONFIRMED");

    let (status, body) = send(&app, get("/api/predictions/42")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_statistics() {
    let (app, _state) = setup_test_app().await;
    send(&app, post_json("/api/predict", earth_like())).await;
    let mut fp = earth_like();
    fp["koi_impact"] = json!(1.1);
    send(&app, post_json("/api/predict", fp)).await;

    let (status, body) = send(&app, get("/api/statistics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_predictions"], 2);
    assert_eq!(body["confirmed_exoplanets"], 1);
    assert_eq!(body["confirm_rate"], 0.5);
    assert_eq!(body["radius_buckets"][2]["name"], "Super-Earth");
    assert_eq!(body["radius_buckets"][2]["count"], 2);
    assert_eq!(body["feature_importance"][0]["feature"], "impact");
    assert_eq!(body["feature_importance"][0]["importance"], 70.0);
}

#[tokio::test]
async fn test_healthz_and_readyz() {
    let (app, state) = setup_test_app().await;

    let (status, body) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_version"], "v-test");

    state
        .health_registry
        .set_degraded(components::PREDICTION_LOG, "disk full")
        .await;
    let (status, body) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state) = setup_test_app().await;
    send(&app, post_json("/api/predict", earth_like())).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("koi_predictions_served_total"));
}

#[tokio::test]
async fn test_persistent_log_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("predictions.jsonl");

    {
        let state = AppState::build(stub_engine(), PredictionLog::open(&path).unwrap(), None, None).await;
        let app = create_router(state);
        send(&app, post_json("/api/predict", earth_like())).await;
    }

    let state = AppState::build(stub_engine(), PredictionLog::open(&path).unwrap(), None, None).await;
    let app = create_router(state);
    let (_, body) = send(&app, post_json("/api/predict", earth_like())).await;
    assert_eq!(body["id"], 2);
}

#[tokio::test]
async fn test_explore_filters_sorts_and_pages() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = send(&app, get("/api/explore")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 25);
    assert_eq!(body["data"][0]["kepoi_name"], "K00754.01");
    assert_eq!(body["disposition_counts"]["FALSE POSITIVE"], 2);

    let (_, body) = send(
        &app,
        get("/api/explore?disposition=FALSE%20POSITIVE&sort=koi_depth&dir=desc"),
    )
    .await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["data"][0]["kepoi_name"], "K00753.01");

    let (_, body) = send(&app, get("/api/explore?per_page=3&page=2&min_snr=abc")).await;
    assert_eq!(body["pages"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = send(&app, get("/api/explore?search=k00752&max_period=")).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["kepid"], 10797460);
}

#[tokio::test]
async fn test_explore_without_catalog_is_not_found() {
    let state = AppState::build(stub_engine(), PredictionLog::in_memory(), None, None).await;
    let app = create_router(state);

    let (status, body) = send(&app, get("/api/explore")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("dataset"));
}

#[tokio::test]
async fn test_explore_classify_catalog_row() {
    let (app, state) = setup_test_app().await;
    let (_, page) = send(&app, get("/api/explore?sort=kepoi_name")).await;
    let row = page["data"][0].clone();
    assert_eq!(row["kepoi_name"], "K00752.01");

    let (status, body) = send(&app, post_json("/api/explore/classify", row)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "CONFIRMED");
    assert_eq!(body["confidence"], 0.92);
    assert_eq!(body["radius"], 2.5);
    assert!(body["latency_ms"].as_f64().is_some());
    assert!(state.log.lock().await.is_empty());

    let (status, body) = send(
        &app,
        post_json("/api/explore/classify", json!({"koi_period": 3.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "koi_impact");
}

#[tokio::test]
async fn test_reset_clears_prediction_log() {
    let (app, state) = setup_test_app().await;
    for _ in 0..2 {
        send(&app, post_json("/api/predict", earth_like())).await;
    }

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/predictions")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 2);
    assert!(state.log.lock().await.is_empty());

    let (_, body) = send(&app, post_json("/api/predict", earth_like())).await;
    assert_eq!(body["id"], 1);
}
