//! Feature engineering for KOI vetting
//!
//! Maps a raw observation to the fixed-order feature vector shared by training
//! and serving: the ten catalog quantities (optional ones imputed with literal
//! defaults) followed by six derived ratios and logarithms.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{RawField, RawObservation};
use serde::{Deserialize, Serialize};

/// Number of features produced by [`FeatureEngineer::engineer`]
pub const NUM_FEATURES: usize = 16;

/// Feature order. Training and serving must agree on it exactly.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "koi_period",
    "koi_impact",
    "koi_duration",
    "koi_depth",
    "koi_model_snr",
    "koi_steff",
    "koi_slogg",
    "koi_srad",
    "koi_smass",
    "koi_smet",
    "period_duration_ratio",
    "log_depth",
    "log_period",
    "log_steff",
    "stellar_density",
    "log_density",
];

/// Substituted for ratios and logs whose denominator or argument is non-positive
pub const DEGENERATE_SENTINEL: f64 = 0.0;

/// Offset keeping `log_density` finite for a zero density
const DENSITY_LOG_OFFSET: f64 = 1e-6;

/// Stellar radii at or below this are treated as zero
const MIN_STELLAR_RADIUS: f64 = 1e-9;

/// Ordered numeric features for one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(|idx| self.0.get(idx).copied())
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// Turns raw observations into model-ready feature vectors
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    /// Check presence, finiteness and physical range of every field
    ///
    /// Reports the first offending field in feature order.
    pub fn validate(&self, raw: &RawObservation) -> PipelineResult<()> {
        for field in RawField::ALL {
            let value = match raw.get(field) {
                Some(v) => v,
                None if field.is_required() => {
                    return Err(PipelineError::invalid(field.name(), "missing required field"))
                }
                None => continue,
            };
            if !value.is_finite() {
                return Err(PipelineError::invalid(field.name(), "must be a finite number"));
            }
            let (lo, hi) = field.valid_range();
            if !(lo..=hi).contains(&value) {
                return Err(PipelineError::invalid(
                    field.name(),
                    format!("{} outside valid range [{}, {}]", value, lo, hi),
                ));
            }
        }
        Ok(())
    }

    /// Compute the full feature vector
    ///
    /// Does not range-check; degenerate denominators and log arguments map to
    /// [`DEGENERATE_SENTINEL`] so the output is always finite.
    pub fn engineer(&self, raw: &RawObservation) -> PipelineResult<FeatureVector> {
        let mut base = [0.0_f64; RawField::ALL.len()];
        for (slot, field) in base.iter_mut().zip(RawField::ALL) {
            *slot = match raw.get(field) {
                Some(v) if v.is_finite() => v,
                Some(_) => {
                    return Err(PipelineError::invalid(field.name(), "must be a finite number"))
                }
                None => field
                    .default_value()
                    .ok_or_else(|| PipelineError::invalid(field.name(), "missing required field"))?,
            };
        }

        let [period, impact, duration, depth, model_snr, steff, slogg, srad, smass, smet] = base;
        let density = stellar_density(smass, srad);

        Ok(FeatureVector(vec![
            period,
            impact,
            duration,
            depth,
            model_snr,
            steff,
            slogg,
            srad,
            smass,
            smet,
            period_duration_ratio(period, duration),
            log1p_floored(depth),
            log1p_floored(period),
            log_steff(steff),
            density,
            (density.max(0.0) + DENSITY_LOG_OFFSET).ln(),
        ]))
    }

    pub fn engineer_batch(&self, raws: &[RawObservation]) -> PipelineResult<Vec<FeatureVector>> {
        raws.iter().map(|raw| self.engineer(raw)).collect()
    }
}

/// Orbital period over transit duration
pub fn period_duration_ratio(period: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        return DEGENERATE_SENTINEL;
    }
    period / duration
}

/// Stellar mass over radius cubed, in solar units
pub fn stellar_density(mass: f64, radius: f64) -> f64 {
    if radius <= MIN_STELLAR_RADIUS {
        return DEGENERATE_SENTINEL;
    }
    mass / radius.powi(3)
}

fn log_steff(steff: f64) -> f64 {
    if steff <= 0.0 {
        return DEGENERATE_SENTINEL;
    }
    steff.ln()
}

fn log1p_floored(value: f64) -> f64 {
    value.max(0.0).ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earth_like() -> RawObservation {
        RawObservation {
            period: Some(365.25),
            impact: Some(0.3),
            duration: Some(13.0),
            depth: Some(84.0),
            model_snr: Some(12.0),
            steff: Some(5778.0),
            slogg: Some(4.44),
            srad: Some(1.0),
            smass: Some(1.0),
            smet: Some(0.0),
        }
    }

    #[test]
    fn test_feature_order_and_length() {
        let f = FeatureEngineer::new().engineer(&earth_like()).unwrap();
        assert_eq!(f.len(), NUM_FEATURES);
        assert_eq!(f.get("koi_period"), Some(365.25));
        assert_eq!(f.get("koi_smet"), Some(0.0));
        assert!((f.get("period_duration_ratio").unwrap() - 365.25 / 13.0).abs() < 1e-12);
        assert!((f.get("log_depth").unwrap() - 85.0_f64.ln()).abs() < 1e-12);
        assert!((f.get("log_period").unwrap() - 366.25_f64.ln()).abs() < 1e-12);
        assert!((f.get("log_steff").unwrap() - 5778.0_f64.ln()).abs() < 1e-12);
        assert_eq!(f.get("stellar_density"), Some(1.0));
        assert!((f.get("log_density").unwrap() - (1.0 + 1e-6_f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_engineer_is_bitwise_deterministic() {
        let engineer = FeatureEngineer::new();
        let a = engineer.engineer(&earth_like()).unwrap();
        for _ in 0..10 {
            let b = engineer.engineer(&earth_like()).unwrap();
            let bits_a: Vec<u64> = a.as_slice().iter().map(|v| v.to_bits()).collect();
            let bits_b: Vec<u64> = b.as_slice().iter().map(|v| v.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
    }

    #[test]
    fn test_zero_duration_uses_sentinel() {
        let raw = earth_like().with(RawField::Duration, 0.0);
        let f = FeatureEngineer::new().engineer(&raw).unwrap();
        assert_eq!(f.get("period_duration_ratio"), Some(DEGENERATE_SENTINEL));
        assert!(f.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zero_depth_is_finite() {
        let raw = earth_like().with(RawField::Depth, 0.0);
        let f = FeatureEngineer::new().engineer(&raw).unwrap();
        assert_eq!(f.get("log_depth"), Some(0.0));
    }

    #[test]
    fn test_degenerate_star_is_finite() {
        let raw = earth_like()
            .with(RawField::Srad, 0.0)
            .with(RawField::Steff, 0.0);
        let f = FeatureEngineer::new().engineer(&raw).unwrap();
        assert_eq!(f.get("stellar_density"), Some(DEGENERATE_SENTINEL));
        assert_eq!(f.get("log_steff"), Some(DEGENERATE_SENTINEL));
        assert!(f.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_density_increases_with_mass() {
        let mut previous = f64::NEG_INFINITY;
        for step in 1..20 {
            let density = stellar_density(0.1 * step as f64, 1.3);
            assert!(density > previous);
            previous = density;
        }
    }

    #[test]
    fn test_missing_optional_fields_are_imputed() {
        let mut raw = earth_like();
        raw.model_snr = None;
        raw.slogg = None;
        raw.smet = None;
        let f = FeatureEngineer::new().engineer(&raw).unwrap();
        assert_eq!(f.get("koi_model_snr"), RawField::ModelSnr.default_value());
        assert_eq!(f.get("koi_slogg"), Some(4.438));
        assert_eq!(f.get("koi_smet"), Some(0.0));
    }

    #[test]
    fn test_missing_required_field_fails() {
        let mut raw = earth_like();
        raw.smass = None;
        let err = FeatureEngineer::new().engineer(&raw).unwrap_err();
        assert_eq!(err.field(), Some("koi_smass"));
    }

    #[test]
    fn test_non_finite_field_fails() {
        let raw = earth_like().with(RawField::Depth, f64::NAN);
        let err = FeatureEngineer::new().engineer(&raw).unwrap_err();
        assert_eq!(err.field(), Some("koi_depth"));

        let raw = earth_like().with(RawField::Smet, f64::INFINITY);
        let err = FeatureEngineer::new().engineer(&raw).unwrap_err();
        assert_eq!(err.field(), Some("koi_smet"));
    }

    #[test]
    fn test_validate_rejects_negative_duration() {
        let raw = earth_like().with(RawField::Duration, -5.0);
        let err = FeatureEngineer::new().validate(&raw).unwrap_err();
        assert_eq!(err.field(), Some("koi_duration"));
    }

    #[test]
    fn test_validate_allows_signed_impact_and_metallicity() {
        let raw = earth_like()
            .with(RawField::Impact, -0.4)
            .with(RawField::Smet, -1.2);
        assert!(FeatureEngineer::new().validate(&raw).is_ok());
    }

    #[test]
    fn test_validate_checks_present_optional_fields() {
        let raw = earth_like().with(RawField::Slogg, 9.0);
        let err = FeatureEngineer::new().validate(&raw).unwrap_err();
        assert_eq!(err.field(), Some("koi_slogg"));
    }
}
