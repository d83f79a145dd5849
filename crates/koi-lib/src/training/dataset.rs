//! KOI catalog CSV loading
//!
//! Reads the cumulative KOI table (comment lines starting with `#` are
//! skipped, unknown columns ignored) and keeps only rows with a binary
//! disposition.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Disposition, RawObservation};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// One labelled catalog row
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub raw: RawObservation,
    pub disposition: Disposition,
    /// Planet radius in Earth radii, when measured
    pub radius: Option<f64>,
}

impl TrainingRow {
    pub fn is_confirmed(&self) -> bool {
        self.disposition.is_confirmed()
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    koi_disposition: String,
    #[serde(default)]
    koi_period: Option<f64>,
    #[serde(default)]
    koi_impact: Option<f64>,
    #[serde(default)]
    koi_duration: Option<f64>,
    #[serde(default)]
    koi_depth: Option<f64>,
    #[serde(default)]
    koi_model_snr: Option<f64>,
    #[serde(default)]
    koi_steff: Option<f64>,
    #[serde(default)]
    koi_slogg: Option<f64>,
    #[serde(default)]
    koi_srad: Option<f64>,
    #[serde(default)]
    koi_smass: Option<f64>,
    #[serde(default)]
    koi_smet: Option<f64>,
    #[serde(default)]
    koi_prad: Option<f64>,
}

impl CsvRow {
    fn into_training_row(self) -> Option<TrainingRow> {
        let disposition = Disposition::parse(&self.koi_disposition)?;
        Some(TrainingRow {
            raw: RawObservation {
                period: finite(self.koi_period),
                impact: finite(self.koi_impact),
                duration: finite(self.koi_duration),
                depth: finite(self.koi_depth),
                model_snr: finite(self.koi_model_snr),
                steff: finite(self.koi_steff),
                slogg: finite(self.koi_slogg),
                srad: finite(self.koi_srad),
                smass: finite(self.koi_smass),
                smet: finite(self.koi_smet),
            },
            disposition,
            radius: finite(self.koi_prad),
        })
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Load labelled rows from a CSV file
pub fn load_csv(path: impl AsRef<Path>) -> PipelineResult<Vec<TrainingRow>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let rows = read_csv(file)?;
    info!(path = %path.display(), rows = rows.len(), "Loaded training dataset");
    Ok(rows)
}

/// Parse labelled rows from any CSV source
pub fn read_csv<R: Read>(source: R) -> PipelineResult<Vec<TrainingRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source);

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (idx, record) in reader.deserialize::<CsvRow>().enumerate() {
        let record = record
            .map_err(|e| PipelineError::Dataset(format!("row {}: {}", idx + 1, e)))?;
        match record.into_training_row() {
            Some(row) => rows.push(row),
            None => skipped += 1,
        }
    }

    debug!(kept = rows.len(), skipped, "Filtered non-binary dispositions");
    Ok(rows)
}
