//! Model training command

use anyhow::{Context, Result};
use colored::Colorize;
use koi_lib::training::{train_from_csv, TrainingConfig};
use koi_lib::TrainingMetrics;
use serde::Serialize;
use tracing::debug;

use super::metric_rows;
use crate::output::{print_heading, print_info, print_json, print_success, print_table, OutputFormat};
use crate::TrainArgs;

#[derive(Serialize)]
struct TrainingSummary<'a> {
    bundle_version: &'a str,
    output: String,
    metrics: &'a TrainingMetrics,
}

/// Training configuration with any flag overrides applied
pub fn config_from_args(args: &TrainArgs) -> TrainingConfig {
    let mut config = TrainingConfig::default();
    let boosting = &mut config.boosting;
    if let Some(n) = args.estimators {
        boosting.n_estimators = n;
    }
    if let Some(depth) = args.max_depth {
        boosting.max_depth = depth;
    }
    if let Some(rate) = args.learning_rate {
        boosting.learning_rate = rate;
    }
    if let Some(fraction) = args.subsample {
        boosting.subsample = fraction;
    }
    if let Some(seed) = args.seed {
        boosting.seed = seed;
    }
    config
}

pub fn run_training(args: &TrainArgs, format: OutputFormat) -> Result<()> {
    let config = config_from_args(args);
    debug!(?config, "Resolved training config");
    if let OutputFormat::Table = format {
        print_info(&format!(
            "Training on {} ({} rounds, depth {})",
            args.data.display(),
            config.boosting.n_estimators,
            config.boosting.max_depth
        ));
    }

    let artifacts = train_from_csv(&args.data, &args.out, &config)
        .with_context(|| format!("Training from {} failed", args.data.display()))?;

    match format {
        OutputFormat::Json => print_json(&TrainingSummary {
            bundle_version: &artifacts.bundle_version,
            output: args.out.display().to_string(),
            metrics: &artifacts.metrics,
        })?,
        OutputFormat::Table => {
            print_success(&format!(
                "Wrote bundle {} to {}",
                artifacts.bundle_version.cyan(),
                args.out.display()
            ));
            println!();
            print_heading("Held-out Evaluation", 40);
            print_table(metric_rows(&artifacts.metrics));
        }
    }

    Ok(())
}
