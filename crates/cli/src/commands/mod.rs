//! Subcommand implementations

pub mod history;
pub mod inspect;
pub mod predict;
pub mod train;

use koi_lib::TrainingMetrics;
use tabled::Tabled;

use crate::output::format_score;

/// Row for metric tables
#[derive(Tabled)]
pub struct MetricRow {
    #[tabled(rename = "Metric")]
    pub metric: &'static str,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl MetricRow {
    fn score(metric: &'static str, value: f64) -> Self {
        Self {
            metric,
            value: format_score(value),
        }
    }

    fn count(metric: &'static str, value: usize) -> Self {
        Self {
            metric,
            value: value.to_string(),
        }
    }
}

/// Held-out evaluation metrics as table rows
pub fn metric_rows(metrics: &TrainingMetrics) -> Vec<MetricRow> {
    let c = &metrics.classification;
    let r = &metrics.regression;
    vec![
        MetricRow::score("F1", c.f1_score),
        MetricRow::score("ROC AUC", c.roc_auc),
        MetricRow::score("Accuracy", c.accuracy),
        MetricRow::score("Precision", c.precision),
        MetricRow::score("Recall", c.recall),
        MetricRow::score("Radius RMSE", r.rmse),
        MetricRow::score("Radius MAE", r.mae),
        MetricRow::score("Radius R2", r.r2_score),
        MetricRow::count("Train rows", metrics.train_rows),
        MetricRow::count("Test rows", metrics.test_rows),
        MetricRow::count("Radius train rows", metrics.regression_train_rows),
        MetricRow::count("Radius test rows", metrics.regression_test_rows),
    ]
}
