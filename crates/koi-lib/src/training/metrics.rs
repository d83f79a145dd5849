//! Held-out evaluation metrics

use crate::predictor::DECISION_THRESHOLD;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub f1_score: f64,
    pub roc_auc: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2_score: f64,
}

/// Everything the training run measured, stored with the bundle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    pub classification: ClassificationMetrics,
    pub regression: RegressionMetrics,
    pub train_rows: usize,
    pub test_rows: usize,
    pub regression_train_rows: usize,
    pub regression_test_rows: usize,
}

/// Score CONFIRMED probabilities against ground truth (`true` = CONFIRMED)
pub fn classification_metrics(labels: &[bool], probabilities: &[f64]) -> ClassificationMetrics {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut tn = 0usize;
    let mut fn_ = 0usize;
    for (&actual, &p) in labels.iter().zip(probabilities) {
        match (actual, p > DECISION_THRESHOLD) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (false, false) => tn += 1,
            (true, false) => fn_ += 1,
        }
    }

    let total = tp + fp + tn + fn_;
    let accuracy = ratio(tp + tn, total);
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1_score = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    ClassificationMetrics {
        f1_score,
        roc_auc: roc_auc(labels, probabilities),
        accuracy,
        precision,
        recall,
    }
}

/// Area under the ROC curve via the Mann-Whitney U statistic
///
/// Tied scores receive their average rank. A single-class input yields 0.5.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> f64 {
    let n = labels.len().min(scores.len());
    let n_pos = labels[..n].iter().filter(|&&l| l).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let average = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = average;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = (0..n).filter(|&k| labels[k]).map(|k| ranks[k]).sum();
    let u = positive_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos * n_neg) as f64
}

pub fn regression_metrics(actual: &[f64], predicted: &[f64]) -> RegressionMetrics {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return RegressionMetrics {
            rmse: 0.0,
            mae: 0.0,
            r2_score: 0.0,
        };
    }
    let nf = n as f64;
    let pairs = || actual.iter().zip(predicted).take(n);

    let ss_res: f64 = pairs().map(|(a, p)| (a - p).powi(2)).sum();
    let mae = pairs().map(|(a, p)| (a - p).abs()).sum::<f64>() / nf;
    let mean = actual[..n].iter().sum::<f64>() / nf;
    let ss_tot: f64 = actual[..n].iter().map(|a| (a - mean).powi(2)).sum();

    let r2_score = if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    };

    RegressionMetrics {
        rmse: (ss_res / nf).sqrt(),
        mae,
        r2_score,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
