//! KOI vetting CLI
//!
//! Trains artifact bundles, runs local predictions against them and queries
//! the prediction log of a running server.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use commands::{history, inspect, predict, train};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// KOI vetting CLI
#[derive(Parser)]
#[command(name = "koi")]
#[command(author, version, about = "CLI for the KOI exoplanet vetting pipeline", long_about = None)]
pub struct Cli {
    /// Server URL for history queries (can also be set via KOI_API_URL env var)
    #[arg(long, env = "KOI_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train models from a KOI catalog CSV and write an artifact bundle
    Train(TrainArgs),

    /// Vet one KOI locally against an artifact bundle
    Predict(PredictArgs),

    /// Show version, evaluation metrics and feature importances of a bundle
    Inspect {
        /// Artifact bundle to inspect
        #[arg(long, env = "KOI_ARTIFACT_PATH", default_value = "models/bundle.json")]
        bundle: PathBuf,

        /// Number of features to list
        #[arg(long, default_value = "10")]
        top: usize,
    },

    /// Query the prediction log of a running server
    #[command(subcommand)]
    History(HistoryCommands),
}

#[derive(Args)]
pub struct TrainArgs {
    /// KOI catalog CSV
    #[arg(long)]
    pub data: PathBuf,

    /// Where to write the artifact bundle
    #[arg(long, default_value = "models/bundle.json")]
    pub out: PathBuf,

    /// Boosting rounds per model
    #[arg(long)]
    pub estimators: Option<usize>,

    /// Maximum tree depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Shrinkage applied to each tree
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Row fraction sampled per tree
    #[arg(long)]
    pub subsample: Option<f64>,

    /// Seed for the split and the subsamples
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args)]
pub struct PredictArgs {
    /// Artifact bundle to load
    #[arg(long, env = "KOI_ARTIFACT_PATH", default_value = "models/bundle.json")]
    pub bundle: PathBuf,

    /// Orbital period (days)
    #[arg(long)]
    pub period: f64,

    /// Impact parameter
    #[arg(long, allow_hyphen_values = true)]
    pub impact: f64,

    /// Transit duration (hours)
    #[arg(long)]
    pub duration: f64,

    /// Transit depth (ppm)
    #[arg(long)]
    pub depth: f64,

    /// Stellar effective temperature (K)
    #[arg(long)]
    pub steff: f64,

    /// Stellar radius (solar radii)
    #[arg(long)]
    pub srad: f64,

    /// Stellar mass (solar masses)
    #[arg(long)]
    pub smass: f64,

    /// Transit signal-to-noise ratio
    #[arg(long)]
    pub model_snr: Option<f64>,

    /// Stellar surface gravity (log10 cm/s^2)
    #[arg(long)]
    pub slogg: Option<f64>,

    /// Stellar metallicity (dex)
    #[arg(long, allow_hyphen_values = true)]
    pub smet: Option<f64>,
}

#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List logged predictions, newest first
    List {
        /// Show at most this many records
        #[arg(long, short, default_value = "20")]
        limit: usize,
    },

    /// Show one logged prediction
    Get {
        /// Prediction id
        id: u64,
    },

    /// Show aggregate statistics over the log
    Stats,

    /// Delete every logged prediction on the server
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Train(args) => {
            train::run_training(&args, cli.format)?;
        }
        Commands::Predict(args) => {
            predict::run_prediction(&args, cli.format)?;
        }
        Commands::Inspect { bundle, top } => {
            inspect::inspect_bundle(&bundle, top, cli.format)?;
        }
        Commands::History(history_cmd) => {
            let client = client::ApiClient::new(&cli.api_url)?;
            match history_cmd {
                HistoryCommands::List { limit } => {
                    history::list_predictions(&client, limit, cli.format).await?;
                }
                HistoryCommands::Get { id } => {
                    history::show_prediction(&client, id, cli.format).await?;
                }
                HistoryCommands::Stats => {
                    history::show_statistics(&client, cli.format).await?;
                }
                HistoryCommands::Reset { yes } => {
                    history::reset_history(&client, yes, cli.format).await?;
                }
            }
        }
    }

    Ok(())
}
