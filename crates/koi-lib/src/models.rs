//! Core data models for the vetting pipeline

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Raw physical quantities describing one KOI
///
/// Field names on the wire follow the KOI catalog columns; the short names are
/// accepted as aliases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    #[serde(rename = "koi_period", alias = "period", default, skip_serializing_if = "Option::is_none")]
    pub period: Option<f64>,
    #[serde(rename = "koi_impact", alias = "impact", default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<f64>,
    #[serde(rename = "koi_duration", alias = "duration", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(rename = "koi_depth", alias = "depth", default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(rename = "koi_model_snr", alias = "model_snr", default, skip_serializing_if = "Option::is_none")]
    pub model_snr: Option<f64>,
    #[serde(rename = "koi_steff", alias = "steff", default, skip_serializing_if = "Option::is_none")]
    pub steff: Option<f64>,
    #[serde(rename = "koi_slogg", alias = "slogg", default, skip_serializing_if = "Option::is_none")]
    pub slogg: Option<f64>,
    #[serde(rename = "koi_srad", alias = "srad", default, skip_serializing_if = "Option::is_none")]
    pub srad: Option<f64>,
    #[serde(rename = "koi_smass", alias = "smass", default, skip_serializing_if = "Option::is_none")]
    pub smass: Option<f64>,
    #[serde(rename = "koi_smet", alias = "smet", default, skip_serializing_if = "Option::is_none")]
    pub smet: Option<f64>,
}

/// Named input quantities, in feature-vector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawField {
    Period,
    Impact,
    Duration,
    Depth,
    ModelSnr,
    Steff,
    Slogg,
    Srad,
    Smass,
    Smet,
}

impl RawField {
    pub const ALL: [RawField; 10] = [
        RawField::Period,
        RawField::Impact,
        RawField::Duration,
        RawField::Depth,
        RawField::ModelSnr,
        RawField::Steff,
        RawField::Slogg,
        RawField::Srad,
        RawField::Smass,
        RawField::Smet,
    ];

    /// Catalog column name
    pub fn name(&self) -> &'static str {
        match self {
            RawField::Period => "koi_period",
            RawField::Impact => "koi_impact",
            RawField::Duration => "koi_duration",
            RawField::Depth => "koi_depth",
            RawField::ModelSnr => "koi_model_snr",
            RawField::Steff => "koi_steff",
            RawField::Slogg => "koi_slogg",
            RawField::Srad => "koi_srad",
            RawField::Smass => "koi_smass",
            RawField::Smet => "koi_smet",
        }
    }

    pub fn alias(&self) -> &'static str {
        &self.name()["koi_".len()..]
    }

    pub fn description(&self) -> &'static str {
        match self {
            RawField::Period => "Orbital period (days)",
            RawField::Impact => "Impact parameter",
            RawField::Duration => "Transit duration (hours)",
            RawField::Depth => "Transit depth (ppm)",
            RawField::ModelSnr => "Model signal-to-noise ratio",
            RawField::Steff => "Stellar effective temp (K)",
            RawField::Slogg => "Surface gravity (log g)",
            RawField::Srad => "Stellar radius (solar radii)",
            RawField::Smass => "Stellar mass (solar masses)",
            RawField::Smet => "Stellar metallicity (dex)",
        }
    }

    /// Inclusive range of physically plausible values
    pub fn valid_range(&self) -> (f64, f64) {
        match self {
            RawField::Period => (0.1, 1e5),
            RawField::Impact => (-3.0, 3.0),
            RawField::Duration => (0.01, 200.0),
            RawField::Depth => (0.0, 1e7),
            RawField::ModelSnr => (0.0, 1e6),
            RawField::Steff => (2500.0, 15000.0),
            RawField::Slogg => (0.0, 6.0),
            RawField::Srad => (0.01, 200.0),
            RawField::Smass => (0.01, 100.0),
            RawField::Smet => (-5.0, 5.0),
        }
    }

    /// Fallback used when an optional field is omitted. `None` marks a required field.
    pub fn default_value(&self) -> Option<f64> {
        match self {
            // Kepler TCE detection threshold
            RawField::ModelSnr => Some(7.1),
            // Solar log g (cgs)
            RawField::Slogg => Some(4.438),
            // Solar metallicity
            RawField::Smet => Some(0.0),
            _ => None,
        }
    }

    pub fn is_required(&self) -> bool {
        self.default_value().is_none()
    }
}

impl fmt::Display for RawField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl RawObservation {
    pub fn get(&self, field: RawField) -> Option<f64> {
        match field {
            RawField::Period => self.period,
            RawField::Impact => self.impact,
            RawField::Duration => self.duration,
            RawField::Depth => self.depth,
            RawField::ModelSnr => self.model_snr,
            RawField::Steff => self.steff,
            RawField::Slogg => self.slogg,
            RawField::Srad => self.srad,
            RawField::Smass => self.smass,
            RawField::Smet => self.smet,
        }
    }

    pub fn set(&mut self, field: RawField, value: Option<f64>) {
        let slot = match field {
            RawField::Period => &mut self.period,
            RawField::Impact => &mut self.impact,
            RawField::Duration => &mut self.duration,
            RawField::Depth => &mut self.depth,
            RawField::ModelSnr => &mut self.model_snr,
            RawField::Steff => &mut self.steff,
            RawField::Slogg => &mut self.slogg,
            RawField::Srad => &mut self.srad,
            RawField::Smass => &mut self.smass,
            RawField::Smet => &mut self.smet,
        };
        *slot = value;
    }

    pub fn with(mut self, field: RawField, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    /// Build an observation from a loosely typed JSON object
    ///
    /// Numbers and numeric strings are accepted; `null` and empty strings count
    /// as omitted. Anything else is rejected with the offending field named.
    pub fn from_json(value: &Value) -> PipelineResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| PipelineError::invalid("body", "expected a JSON object"))?;

        let mut raw = RawObservation::default();
        for field in RawField::ALL {
            let entry = object.get(field.name()).or_else(|| object.get(field.alias()));
            let parsed = match entry {
                None | Some(Value::Null) => None,
                Some(Value::Number(n)) => Some(
                    n.as_f64()
                        .ok_or_else(|| PipelineError::invalid(field.name(), "must be a number"))?,
                ),
                Some(Value::String(s)) if s.trim().is_empty() => None,
                Some(Value::String(s)) => Some(
                    s.trim()
                        .parse::<f64>()
                        .map_err(|_| PipelineError::invalid(field.name(), "must be a number"))?,
                ),
                Some(_) => return Err(PipelineError::invalid(field.name(), "must be a number")),
            };
            raw.set(field, parsed);
        }
        Ok(raw)
    }
}

/// Ground-truth or predicted disposition of a KOI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    #[serde(rename = "CONFIRMED")]
    Confirmed,
    #[serde(rename = "FALSE POSITIVE")]
    FalsePositive,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Confirmed => "CONFIRMED",
            Disposition::FalsePositive => "FALSE POSITIVE",
        }
    }

    /// Parse a catalog disposition; other values (e.g. CANDIDATE) yield `None`
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim() {
            "CONFIRMED" => Some(Disposition::Confirmed),
            "FALSE POSITIVE" | "FALSE_POSITIVE" => Some(Disposition::FalsePositive),
            _ => None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Disposition::Confirmed)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class probabilities reported alongside the label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub confirmed: f64,
    pub false_positive: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationOutput {
    pub label: Disposition,
    pub confidence: f64,
    pub probabilities: ClassProbabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionOutput {
    /// Planet radius in Earth radii
    pub planetary_radius: f64,
    pub uncertainty: f64,
}

/// Combined response returned to serving collaborators
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub classification: ClassificationOutput,
    pub regression: RegressionOutput,
    pub latency_ms: f64,
}

/// Relative importance of one feature, for explanatory display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_accepts_catalog_names_and_aliases() {
        let raw: RawObservation =
            serde_json::from_value(json!({"koi_period": 10.5, "duration": 3.2})).unwrap();
        assert_eq!(raw.period, Some(10.5));
        assert_eq!(raw.duration, Some(3.2));
        assert_eq!(raw.depth, None);
    }

    #[test]
    fn test_serialize_uses_catalog_names_and_skips_missing() {
        let raw = RawObservation::default().with(RawField::Steff, 5778.0);
        let value = serde_json::to_value(raw).unwrap();
        assert_eq!(value, json!({"koi_steff": 5778.0}));
    }

    #[test]
    fn test_from_json_coerces_numeric_strings() {
        let raw = RawObservation::from_json(&json!({
            "koi_period": "365.25",
            "impact": 0.3,
            "koi_smet": "",
            "koi_slogg": null,
        }))
        .unwrap();
        assert_eq!(raw.period, Some(365.25));
        assert_eq!(raw.impact, Some(0.3));
        assert_eq!(raw.smet, None);
        assert_eq!(raw.slogg, None);
    }

    #[test]
    fn test_from_json_rejects_non_numeric_with_field() {
        let err = RawObservation::from_json(&json!({"koi_depth": "deep"})).unwrap_err();
        assert_eq!(err.field(), Some("koi_depth"));

        let err = RawObservation::from_json(&json!({"koi_srad": [1.0]})).unwrap_err();
        assert_eq!(err.field(), Some("koi_srad"));

        let err = RawObservation::from_json(&json!([1, 2])).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_required_fields() {
        let required: Vec<_> = RawField::ALL.iter().filter(|f| f.is_required()).collect();
        assert_eq!(required.len(), 7);
        assert!(!RawField::ModelSnr.is_required());
        assert!(!RawField::Slogg.is_required());
        assert!(!RawField::Smet.is_required());
    }

    #[test]
    fn test_disposition_labels() {
        assert_eq!(Disposition::parse("CONFIRMED"), Some(Disposition::Confirmed));
        assert_eq!(Disposition::parse("FALSE POSITIVE"), Some(Disposition::FalsePositive));
        assert_eq!(Disposition::parse("CANDIDATE"), None);
        assert_eq!(
            serde_json::to_value(Disposition::FalsePositive).unwrap(),
            json!("FALSE POSITIVE")
        );
    }
}
