//! KOI vetting server
//!
//! Loads the trained artifact bundle once at startup and serves predictions
//! over HTTP. A missing or corrupt bundle aborts startup.

use anyhow::{Context, Result};
use koi_lib::{Catalog, PipelineError, PredictionLog, StructuredLogger, TrainedArtifacts};
use koi_lib::predictor::InferenceEngine;
use koi_server::{api, AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting koi-server");

    let config = ServerConfig::load()?;
    info!(
        artifact_path = %config.artifact_path.display(),
        history_path = %config.history_path.display(),
        catalog_path = %config.catalog_path.display(),
        "Server configured"
    );

    let logger = StructuredLogger::new("koi-server");

    let artifacts = TrainedArtifacts::load(&config.artifact_path)
        .map_err(|e| {
            PipelineError::ModelNotLoaded(format!("{}: {}", config.artifact_path.display(), e))
        })
        .context("Cannot serve without trained artifacts")?;
    let version = artifacts.bundle_version.clone();
    let model_metrics = artifacts.metrics;
    logger.log_artifacts_loaded(&config.artifact_path.display().to_string(), &version);

    let log = PredictionLog::open(&config.history_path).with_context(|| {
        format!("Failed to open prediction log {}", config.history_path.display())
    })?;

    // The explorer is optional; serving proceeds without a catalog
    let catalog = match Catalog::load(&config.catalog_path) {
        Ok(catalog) => Some(catalog),
        Err(e) => {
            warn!(
                path = %config.catalog_path.display(),
                error = %e,
                "KOI catalog unavailable, explorer disabled"
            );
            None
        }
    };

    let engine = InferenceEngine::from_artifacts(artifacts);
    let state = AppState::build(engine, log, Some(model_metrics), catalog).await;

    logger.log_startup(SERVER_VERSION, &version, config.api_port);

    api::serve(config.api_port, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    })
    .await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
