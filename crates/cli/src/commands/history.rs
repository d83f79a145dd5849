//! Prediction log queries against a running server

use anyhow::Result;
use colored::Colorize;
use koi_lib::PredictionRecord;
use tabled::Tabled;

use super::metric_rows;
use crate::client::ApiClient;
use crate::output::{
    color_confidence, color_label, format_percent, print_heading, print_info, print_json,
    print_success, print_table, print_warning, OutputFormat,
};

/// Row for the prediction log table
#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Disposition")]
    label: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Radius (R⊕)")]
    radius: String,
    #[tabled(rename = "Latency (ms)")]
    latency: String,
}

impl From<&PredictionRecord> for RecordRow {
    fn from(record: &PredictionRecord) -> Self {
        Self {
            id: record.id,
            timestamp: record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            label: color_label(record.classification_result),
            confidence: color_confidence(record.classification_confidence),
            radius: format!(
                "{:.2} ± {:.2}",
                record.regression_result, record.regression_uncertainty
            ),
            latency: format!("{:.1}", record.latency_ms),
        }
    }
}

#[derive(Tabled)]
struct BucketRow {
    #[tabled(rename = "Bucket")]
    name: String,
    #[tabled(rename = "Count")]
    count: usize,
}

/// List logged predictions, newest first
pub async fn list_predictions(client: &ApiClient, limit: usize, format: OutputFormat) -> Result<()> {
    let mut records = client.list_predictions().await?;
    let total = records.len();
    records.truncate(limit);

    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Table => {
            print_table(records.iter().map(RecordRow::from).collect());
            println!("\nShowing {} of {} predictions", records.len(), total);
        }
    }

    Ok(())
}

/// Show one logged prediction with its inputs
pub async fn show_prediction(client: &ApiClient, id: u64, format: OutputFormat) -> Result<()> {
    let record = client.get_prediction(id).await?;

    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Table => {
            print_heading(&format!("Prediction #{}", record.id), 50);
            println!("Timestamp:    {}", record.timestamp.to_rfc3339());
            println!("Disposition:  {}", color_label(record.classification_result));
            println!(
                "Confidence:   {}",
                color_confidence(record.classification_confidence)
            );
            println!(
                "Radius:       {:.4} ± {:.4} R⊕",
                record.regression_result, record.regression_uncertainty
            );
            println!("Latency:      {:.1} ms", record.latency_ms);
            println!();
            println!("{}", "Inputs".bold());
            println!("{}", serde_json::to_string_pretty(&record.input_data)?);
        }
    }

    Ok(())
}

/// Show aggregate statistics over the log
pub async fn show_statistics(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let stats = client.statistics().await?;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Table => {
            let summary = &stats.summary;
            print_heading("Prediction Statistics", 50);
            if summary.total_predictions == 0 {
                print_info("No predictions logged yet");
                return Ok(());
            }
            println!("Total:           {}", summary.total_predictions);
            println!(
                "Confirmed:       {} ({})",
                summary.confirmed_exoplanets.to_string().green(),
                format_percent(summary.confirm_rate)
            );
            println!("False positives: {}", summary.false_positives);
            println!("Avg confidence:  {}", format_percent(summary.avg_confidence));
            println!("Avg radius:      {:.2} R⊕", summary.avg_planetary_radius);
            println!("Avg latency:     {:.1} ms", summary.avg_latency_ms);
            println!();

            println!("{}", "Radius".bold());
            print_table(
                summary
                    .radius_buckets
                    .iter()
                    .map(|b| BucketRow {
                        name: format!("{} ({})", b.name, b.label),
                        count: b.count,
                    })
                    .collect(),
            );
            println!();

            println!("{}", "Confidence".bold());
            print_table(
                summary
                    .confidence_buckets
                    .iter()
                    .map(|b| BucketRow {
                        name: b.range.clone(),
                        count: b.count,
                    })
                    .collect(),
            );

            if let Some(metrics) = &stats.model_metrics {
                println!();
                println!("{}", "Model Evaluation".bold());
                print_table(metric_rows(metrics));
            }
        }
    }

    Ok(())
}

/// Clear the server's prediction log; refuses without `--yes`
pub async fn reset_history(client: &ApiClient, confirmed: bool, format: OutputFormat) -> Result<()> {
    if !confirmed {
        print_warning("This deletes every logged prediction; rerun with --yes to confirm");
        anyhow::bail!("reset not confirmed");
    }

    let removed = client.reset_predictions().await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "removed": removed }))?,
        OutputFormat::Table => print_success(&format!("Removed {} predictions", removed)),
    }

    Ok(())
}
