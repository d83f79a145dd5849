//! Local prediction command

use anyhow::{Context, Result};
use colored::Colorize;
use koi_lib::predictor::InferenceEngine;
use koi_lib::{PredictionResult, RawObservation};

use crate::output::{color_confidence, color_label, format_percent, print_heading, print_json, OutputFormat};
use crate::PredictArgs;

/// Raw observation from command-line flags
pub fn observation_from_args(args: &PredictArgs) -> RawObservation {
    RawObservation {
        period: Some(args.period),
        impact: Some(args.impact),
        duration: Some(args.duration),
        depth: Some(args.depth),
        model_snr: args.model_snr,
        steff: Some(args.steff),
        slogg: args.slogg,
        srad: Some(args.srad),
        smass: Some(args.smass),
        smet: args.smet,
    }
}

pub fn run_prediction(args: &PredictArgs, format: OutputFormat) -> Result<()> {
    let engine = InferenceEngine::load(&args.bundle)?;
    let raw = observation_from_args(args);
    let result = engine.predict(&raw).context("Prediction rejected")?;

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_result(&result, engine.model_version().unwrap_or("unknown")),
    }

    Ok(())
}

fn print_result(result: &PredictionResult, version: &str) {
    let classification = &result.classification;
    let regression = &result.regression;

    print_heading("KOI Vetting Result", 40);
    println!("Model:        {}", version.cyan());
    println!("Disposition:  {}", color_label(classification.label));
    println!("Confidence:   {}", color_confidence(classification.confidence));
    println!(
        "P(confirmed): {}",
        format_percent(classification.probabilities.confirmed)
    );
    println!(
        "Radius:       {:.4} ± {:.4} R⊕",
        regression.planetary_radius, regression.uncertainty
    );
    println!("Latency:      {:.1} ms", result.latency_ms);
}
