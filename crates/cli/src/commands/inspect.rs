//! Artifact bundle inspection command

use anyhow::{Context, Result};
use colored::Colorize;
use koi_lib::predictor::InferenceEngine;
use koi_lib::{FeatureImportance, TrainedArtifacts, TrainingMetrics};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use super::metric_rows;
use crate::output::{print_heading, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct ImportanceRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Importance (%)")]
    importance: String,
}

#[derive(Serialize)]
struct BundleSummary {
    bundle_version: String,
    created_at: String,
    feature_count: usize,
    metrics: TrainingMetrics,
    top_features: Vec<FeatureImportance>,
}

pub fn inspect_bundle(path: &Path, top: usize, format: OutputFormat) -> Result<()> {
    let artifacts = TrainedArtifacts::load(path)
        .with_context(|| format!("Failed to load bundle {}", path.display()))?;

    let bundle_version = artifacts.bundle_version.clone();
    let created_at = artifacts.created_at.to_rfc3339();
    let feature_count = artifacts.feature_names.len();
    let metrics = artifacts.metrics;

    let engine = InferenceEngine::from_artifacts(artifacts);
    let summary = BundleSummary {
        bundle_version,
        created_at,
        feature_count,
        metrics,
        top_features: engine.top_features(top),
    };

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            print_heading("Artifact Bundle", 50);
            println!("Path:      {}", path.display());
            println!("Version:   {}", summary.bundle_version.cyan());
            println!("Created:   {}", summary.created_at);
            println!("Features:  {}", summary.feature_count);
            println!();

            println!("{}", "Evaluation".bold());
            print_table(metric_rows(&summary.metrics));
            println!();

            println!("{}", "Feature Importance".bold());
            print_table(
                summary
                    .top_features
                    .iter()
                    .map(|f| ImportanceRow {
                        feature: f.feature.clone(),
                        importance: format!("{:.2}", f.importance),
                    })
                    .collect(),
            );
        }
    }

    Ok(())
}
