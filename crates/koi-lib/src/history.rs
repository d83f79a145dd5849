//! Prediction log
//!
//! Append-only record of served predictions with optional JSON-lines
//! persistence. Records are reloaded when the log is reopened, and ids keep
//! ascending across restarts.

use crate::error::PipelineResult;
use crate::models::{Disposition, PredictionResult, RawObservation};
use crate::predictor::round_to;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One served prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub input_data: RawObservation,
    pub classification_result: Disposition,
    pub classification_confidence: f64,
    pub regression_result: f64,
    pub regression_uncertainty: f64,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadiusBucket {
    pub name: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBucket {
    pub range: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: String,
    pub confirmed: usize,
    pub false_positive: usize,
    pub total: usize,
}

/// Aggregate view over the whole log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionStatistics {
    pub total_predictions: usize,
    pub confirmed_exoplanets: usize,
    pub false_positives: usize,
    pub confirm_rate: f64,
    pub avg_confidence: f64,
    pub avg_planetary_radius: f64,
    pub avg_latency_ms: f64,
    pub radius_buckets: Vec<RadiusBucket>,
    pub confidence_buckets: Vec<ConfidenceBucket>,
    pub timeline: Vec<TimelinePoint>,
}

/// Planet size classes by radius in Earth radii, `[lo, hi)`
const RADIUS_CLASSES: [(&str, &str, f64, f64); 6] = [
    ("Sub-Earth", "< 1 R⊕", 0.0, 1.0),
    ("Earth-like", "1–2 R⊕", 1.0, 2.0),
    ("Super-Earth", "2–4 R⊕", 2.0, 4.0),
    ("Neptune-like", "4–8 R⊕", 4.0, 8.0),
    ("Jupiter-like", "8–15 R⊕", 8.0, 15.0),
    ("Super-Jupiter", "> 15 R⊕", 15.0, f64::INFINITY),
];

/// Confidence ranges, `[lo, hi)`
const CONFIDENCE_CLASSES: [(&str, f64, f64); 5] = [
    ("<60%", 0.0, 0.60),
    ("60-70%", 0.60, 0.70),
    ("70-80%", 0.70, 0.80),
    ("80-90%", 0.80, 0.90),
    (">90%", 0.90, 1.01),
];

pub struct PredictionLog {
    records: Vec<PredictionRecord>,
    next_id: u64,
    persistence_path: Option<PathBuf>,
}

impl PredictionLog {
    pub fn in_memory() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
            persistence_path: None,
        }
    }

    /// Open a log backed by a JSON-lines file, loading existing records
    pub fn open(path: impl Into<PathBuf>) -> PipelineResult<Self> {
        let path = path.into();
        let mut log = Self {
            persistence_path: Some(path.clone()),
            ..Self::in_memory()
        };

        if path.exists() {
            log.load_from_disk(&path)?;
        } else if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), records = log.records.len(), "Opened prediction log");
        Ok(log)
    }

    fn load_from_disk(&mut self, path: &Path) -> PipelineResult<()> {
        let reader = BufReader::new(File::open(path)?);
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<PredictionRecord>(&line) {
                Ok(record) => {
                    self.next_id = self.next_id.max(record.id + 1);
                    self.records.push(record);
                }
                Err(e) => {
                    warn!(line = line_no + 1, error = %e, "Skipping malformed prediction record");
                }
            }
        }
        self.records.sort_by_key(|r| r.id);
        Ok(())
    }

    /// Record a served prediction and return the stored entry
    pub fn append(
        &mut self,
        input: RawObservation,
        result: &PredictionResult,
    ) -> PipelineResult<PredictionRecord> {
        let record = PredictionRecord {
            id: self.next_id,
            timestamp: Utc::now(),
            input_data: input,
            classification_result: result.classification.label,
            classification_confidence: result.classification.confidence,
            regression_result: result.regression.planetary_radius,
            regression_uncertainty: result.regression.uncertainty,
            latency_ms: result.latency_ms,
        };

        if let Some(path) = &self.persistence_path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');
            file.write_all(&line)?;
        }

        self.next_id += 1;
        self.records.push(record.clone());
        debug!(id = record.id, "Prediction recorded");
        Ok(record)
    }

    /// Newest first
    pub fn list(&self) -> Vec<PredictionRecord> {
        self.records.iter().rev().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Option<&PredictionRecord> {
        self.records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|idx| &self.records[idx])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record and truncate the backing file
    pub fn reset(&mut self) -> PipelineResult<usize> {
        let removed = self.records.len();
        self.records.clear();
        self.next_id = 1;
        if let Some(path) = &self.persistence_path {
            File::create(path)?;
        }
        info!(removed, "Prediction log reset");
        Ok(removed)
    }

    pub fn statistics(&self) -> PredictionStatistics {
        let total = self.records.len();
        let confirmed = self
            .records
            .iter()
            .filter(|r| r.classification_result.is_confirmed())
            .count();

        let mean = |f: fn(&PredictionRecord) -> f64| {
            if total == 0 {
                0.0
            } else {
                self.records.iter().map(f).sum::<f64>() / total as f64
            }
        };

        let radius_buckets = RADIUS_CLASSES
            .iter()
            .map(|&(name, label, lo, hi)| RadiusBucket {
                name: name.to_string(),
                label: label.to_string(),
                count: self
                    .records
                    .iter()
                    .filter(|r| lo <= r.regression_result && r.regression_result < hi)
                    .count(),
            })
            .collect();

        let confidence_buckets = CONFIDENCE_CLASSES
            .iter()
            .map(|&(range, lo, hi)| ConfidenceBucket {
                range: range.to_string(),
                count: self
                    .records
                    .iter()
                    .filter(|r| lo <= r.classification_confidence && r.classification_confidence < hi)
                    .count(),
            })
            .collect();

        let mut by_date: BTreeMap<String, TimelinePoint> = BTreeMap::new();
        for record in &self.records {
            let date = record.timestamp.format("%Y-%m-%d").to_string();
            let point = by_date.entry(date.clone()).or_insert_with(|| TimelinePoint {
                date,
                confirmed: 0,
                false_positive: 0,
                total: 0,
            });
            point.total += 1;
            if record.classification_result.is_confirmed() {
                point.confirmed += 1;
            } else {
                point.false_positive += 1;
            }
        }

        PredictionStatistics {
            total_predictions: total,
            confirmed_exoplanets: confirmed,
            false_positives: total - confirmed,
            confirm_rate: if total == 0 {
                0.0
            } else {
                round_to(confirmed as f64 / total as f64, 4)
            },
            avg_confidence: round_to(mean(|r| r.classification_confidence), 4),
            avg_planetary_radius: round_to(mean(|r| r.regression_result), 4),
            avg_latency_ms: round_to(mean(|r| r.latency_ms), 1),
            radius_buckets,
            confidence_buckets,
            timeline: by_date.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ClassProbabilities, ClassificationOutput, RawField, RegressionOutput,
    };

    fn result(label: Disposition, confidence: f64, radius: f64) -> PredictionResult {
        let confirmed = if label.is_confirmed() {
            confidence
        } else {
            1.0 - confidence
        };
        PredictionResult {
            classification: ClassificationOutput {
                label,
                confidence,
                probabilities: ClassProbabilities {
                    confirmed,
                    false_positive: 1.0 - confirmed,
                },
            },
            regression: RegressionOutput {
                planetary_radius: radius,
                uncertainty: 0.1,
            },
            latency_ms: 0.4,
        }
    }

    fn input() -> RawObservation {
        RawObservation::default().with(RawField::Period, 12.0)
    }

    #[test]
    fn test_ids_ascend_and_list_is_newest_first() {
        let mut log = PredictionLog::in_memory();
        for _ in 0..3 {
            log.append(input(), &result(Disposition::Confirmed, 0.9, 1.2)).unwrap();
        }
        let listed: Vec<u64> = log.list().iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![3, 2, 1]);
        assert_eq!(log.get(2).unwrap().id, 2);
        assert!(log.get(9).is_none());
    }

    #[test]
    fn test_persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("predictions.jsonl");

        {
            let mut log = PredictionLog::open(&path).unwrap();
            log.append(input(), &result(Disposition::Confirmed, 0.95, 1.1)).unwrap();
            log.append(input(), &result(Disposition::FalsePositive, 0.7, 20.0)).unwrap();
        }

        let mut reopened = PredictionLog::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get(1).unwrap().input_data.period, Some(12.0));
        let next = reopened
            .append(input(), &result(Disposition::Confirmed, 0.8, 3.0))
            .unwrap();
        assert_eq!(next.id, 3);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.jsonl");
        {
            let mut log = PredictionLog::open(&path).unwrap();
            log.append(input(), &result(Disposition::Confirmed, 0.9, 1.0)).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not json").unwrap();

        let log = PredictionLog::open(&path).unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_reset_clears_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.jsonl");
        let mut log = PredictionLog::open(&path).unwrap();
        log.append(input(), &result(Disposition::Confirmed, 0.9, 1.0)).unwrap();

        assert_eq!(log.reset().unwrap(), 1);
        assert!(log.is_empty());
        assert_eq!(PredictionLog::open(&path).unwrap().len(), 0);
        let record = log.append(input(), &result(Disposition::Confirmed, 0.9, 1.0)).unwrap();
        assert_eq!(record.id, 1);
    }

    #[test]
    fn test_statistics_buckets() {
        let mut log = PredictionLog::in_memory();
        log.append(input(), &result(Disposition::Confirmed, 0.95, 0.5)).unwrap();
        log.append(input(), &result(Disposition::Confirmed, 0.85, 1.5)).unwrap();
        log.append(input(), &result(Disposition::FalsePositive, 0.65, 12.0)).unwrap();
        log.append(input(), &result(Disposition::FalsePositive, 0.55, 30.0)).unwrap();

        let stats = log.statistics();
        assert_eq!(stats.total_predictions, 4);
        assert_eq!(stats.confirmed_exoplanets, 2);
        assert_eq!(stats.false_positives, 2);
        assert_eq!(stats.confirm_rate, 0.5);
        assert_eq!(stats.avg_confidence, 0.75);
        assert_eq!(stats.avg_latency_ms, 0.4);

        let radius: Vec<usize> = stats.radius_buckets.iter().map(|b| b.count).collect();
        assert_eq!(radius, vec![1, 1, 0, 0, 1, 1]);
        let confidence: Vec<usize> = stats.confidence_buckets.iter().map(|b| b.count).collect();
        assert_eq!(confidence, vec![1, 1, 0, 1, 1]);

        let timeline_total: usize = stats.timeline.iter().map(|p| p.total).sum();
        assert_eq!(timeline_total, 4);
    }

    #[test]
    fn test_timeline_keys_on_full_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.jsonl");
        let stamps = [
            ("2026-12-31T08:00:00Z", Disposition::Confirmed),
            ("2025-12-31T09:00:00Z", Disposition::FalsePositive),
            ("2026-01-01T10:00:00Z", Disposition::Confirmed),
            ("2026-12-31T23:00:00Z", Disposition::FalsePositive),
        ];
        let mut file = File::create(&path).unwrap();
        for (i, (stamp, label)) in stamps.iter().enumerate() {
            let record = PredictionRecord {
                id: i as u64 + 1,
                timestamp: stamp.parse().unwrap(),
                input_data: input(),
                classification_result: *label,
                classification_confidence: 0.9,
                regression_result: 1.0,
                regression_uncertainty: 0.1,
                latency_ms: 0.4,
            };
            writeln!(file, "{}", serde_json::to_string(&record).unwrap()).unwrap();
        }
        drop(file);

        let stats = PredictionLog::open(&path).unwrap().statistics();
        let dates: Vec<&str> = stats.timeline.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2025-12-31", "2026-01-01", "2026-12-31"]);
        assert_eq!(stats.timeline[2].total, 2);
        assert_eq!(stats.timeline[2].confirmed, 1);
        assert_eq!(stats.timeline[2].false_positive, 1);
    }

    #[test]
    fn test_empty_statistics() {
        let stats = PredictionLog::in_memory().statistics();
        assert_eq!(stats.total_predictions, 0);
        assert_eq!(stats.confirm_rate, 0.0);
        assert_eq!(stats.radius_buckets.len(), 6);
        assert!(stats.timeline.is_empty());
    }
}
