//! # Scoring Adapter
//! Validating wrapper around the opaque risk model. The adapter is the
//! only path from a feature record to a `RiskScore` and enforces the
//! scoring contract:
//!
//! - feature names must match the model schema exactly (no zero-filling),
//! - every value must be finite,
//! - output is bounded to `[0.0, 1.0]`,
//! - identical record + model version always yields the identical value.
//!
//! Dev logging records a SHA-256 fingerprint of the record, never raw
//! feature values; SIEM features routinely encode user behavior.

use std::env;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::alert::{clamp01, FeatureRecord, RiskScore};
use crate::error::{EngineError, ModelFailure};

/// Gate for the dev-only scoring log (target `triage`).
pub const ENV_DEV_LOG: &str = "TRIAGE_DEV_LOG";
/// Environment name; dev logging stays off outside local/dev builds.
pub const ENV_APP_ENV: &str = "TRIAGE_ENV";

/// Feature names a deployed model expects, held sorted and deduplicated.
/// Schema order is the alignment contract for `score_values` and
/// `attribute_values`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(mut names: Vec<String>) -> Self {
        names.sort();
        names.dedup();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }

    /// Exact-match check: both missing and unexpected names are errors.
    pub fn validate(&self, record: &FeatureRecord) -> Result<(), EngineError> {
        let missing: Vec<String> = self
            .names
            .iter()
            .filter(|n| !record.features.contains_key(*n))
            .cloned()
            .collect();
        let unexpected: Vec<String> = record
            .features
            .keys()
            .filter(|k| !self.contains(k))
            .cloned()
            .collect();
        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            Err(EngineError::FeatureMismatch {
                missing,
                unexpected,
            })
        }
    }
}

/// Opaque, frozen scoring capability supplied by the model loader.
///
/// Implementations must be pure: no side effects, and the same values
/// always produce the same output for a given version.
pub trait ScoringModel: Send + Sync {
    /// Version identifier of the trained artifact.
    fn version(&self) -> &str;

    /// Feature names the model expects, exactly.
    fn schema(&self) -> &FeatureSchema;

    /// Raw model output for values aligned to `schema()` order. The raw
    /// output may fall outside `[0, 1]`; the adapter bounds it.
    fn score_values(&self, values: &[f64]) -> Result<f64, ModelFailure>;
}

/// The validated scoring path. Cheap to clone; shares the model.
#[derive(Clone)]
pub struct ScoringAdapter {
    model: Arc<dyn ScoringModel>,
}

impl ScoringAdapter {
    pub fn new(model: Arc<dyn ScoringModel>) -> Self {
        Self { model }
    }

    pub fn version(&self) -> &str {
        self.model.version()
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.model.schema()
    }

    /// Score one record under the full contract. No state is touched on
    /// failure, so callers can treat errors as "nothing happened".
    pub fn score(&self, record: &FeatureRecord) -> Result<RiskScore, EngineError> {
        let values = schema_values(self.model.schema(), record)?;
        let raw = self.model.score_values(&values)?;
        if !raw.is_finite() {
            return Err(EngineError::Model(ModelFailure(format!(
                "non-finite model output: {raw}"
            ))));
        }
        let value = clamp01(raw);
        if value != raw {
            debug!(
                alert_id = %record.alert_id,
                raw,
                bounded = value,
                "model output outside [0,1], bounded"
            );
        }
        dev_log_scoring(record, value, self.model.version());
        Ok(RiskScore {
            value,
            model_version: self.model.version().to_string(),
        })
    }
}

/// Validate a record against a schema and extract its values in schema
/// order, rejecting non-finite input with the offending feature name.
pub(crate) fn schema_values(
    schema: &FeatureSchema,
    record: &FeatureRecord,
) -> Result<Vec<f64>, EngineError> {
    schema.validate(record)?;
    let mut out = Vec::with_capacity(schema.len());
    for name in schema.names() {
        let value = match record.features.get(name) {
            Some(v) => *v,
            None => {
                return Err(EngineError::FeatureMismatch {
                    missing: vec![name.clone()],
                    unexpected: Vec::new(),
                })
            }
        };
        if !value.is_finite() {
            return Err(EngineError::InvalidFeatureValue {
                feature: name.clone(),
                value,
            });
        }
        out.push(value);
    }
    Ok(out)
}

/// Short stable fingerprint of a record for log correlation.
pub(crate) fn record_fingerprint(record: &FeatureRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.alert_id.as_bytes());
    for (name, value) in &record.features {
        hasher.update(name.as_bytes());
        hasher.update(value.to_bits().to_le_bytes());
    }
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

fn dev_logging_enabled() -> bool {
    if env::var(ENV_DEV_LOG).map(|v| v == "1").unwrap_or(false) {
        let app_env = env::var(ENV_APP_ENV).unwrap_or_default();
        cfg!(debug_assertions)
            || app_env == "local"
            || app_env == "dev"
            || app_env == "development"
    } else {
        false
    }
}

fn dev_log_scoring(record: &FeatureRecord, value: f64, version: &str) {
    if !dev_logging_enabled() {
        return;
    }
    info!(
        target: "triage",
        fp = %record_fingerprint(record),
        score = value,
        version = %version,
        "scored record"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal opaque model: mean of the inputs, shifted by `offset`.
    struct MeanModel {
        schema: FeatureSchema,
        offset: f64,
    }

    impl MeanModel {
        fn new(names: &[&str], offset: f64) -> Self {
            Self {
                schema: FeatureSchema::new(names.iter().map(|s| s.to_string()).collect()),
                offset,
            }
        }
    }

    impl ScoringModel for MeanModel {
        fn version(&self) -> &str {
            "mean-1"
        }
        fn schema(&self) -> &FeatureSchema {
            &self.schema
        }
        fn score_values(&self, values: &[f64]) -> Result<f64, ModelFailure> {
            if values.is_empty() {
                return Err(ModelFailure("empty input".into()));
            }
            Ok(values.iter().sum::<f64>() / values.len() as f64 + self.offset)
        }
    }

    fn record(lf: f64, bx: f64) -> FeatureRecord {
        FeatureRecord::new("A-1")
            .with_feature("login_failures", lf)
            .with_feature("bytes_exfiltrated", bx)
    }

    fn adapter(offset: f64) -> ScoringAdapter {
        ScoringAdapter::new(Arc::new(MeanModel::new(
            &["login_failures", "bytes_exfiltrated"],
            offset,
        )))
    }

    #[test]
    fn scoring_is_deterministic() {
        let a = adapter(0.0);
        let r = record(0.8, 0.4);
        let first = a.score(&r).unwrap();
        let second = a.score(&r).unwrap();
        assert_eq!(first, second);
        assert!((first.value - 0.6).abs() < 1e-12);
        assert_eq!(first.model_version, "mean-1");
    }

    #[test]
    fn missing_feature_is_named() {
        let a = adapter(0.0);
        let r = FeatureRecord::new("A-2").with_feature("bytes_exfiltrated", 0.4);
        let err = a.score(&r).unwrap_err();
        match &err {
            EngineError::FeatureMismatch { missing, unexpected } => {
                assert_eq!(missing, &vec!["login_failures".to_string()]);
                assert!(unexpected.is_empty());
            }
            other => panic!("expected FeatureMismatch, got {other:?}"),
        }
        assert!(err.to_string().contains("login_failures"));
    }

    #[test]
    fn unexpected_feature_is_rejected_not_ignored() {
        let a = adapter(0.0);
        let r = record(0.8, 0.4).with_feature("dst_port_entropy", 0.9);
        match a.score(&r).unwrap_err() {
            EngineError::FeatureMismatch { missing, unexpected } => {
                assert!(missing.is_empty());
                assert_eq!(unexpected, vec!["dst_port_entropy".to_string()]);
            }
            other => panic!("expected FeatureMismatch, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_value_names_the_feature() {
        let a = adapter(0.0);
        let r = record(f64::NAN, 0.4);
        match a.score(&r).unwrap_err() {
            EngineError::InvalidFeatureValue { feature, .. } => {
                assert_eq!(feature, "login_failures");
            }
            other => panic!("expected InvalidFeatureValue, got {other:?}"),
        }
    }

    #[test]
    fn output_is_bounded() {
        let high = adapter(5.0).score(&record(1.0, 1.0)).unwrap();
        assert!((high.value - 1.0).abs() < 1e-12);
        let low = adapter(-5.0).score(&record(0.0, 0.0)).unwrap();
        assert!(low.value.abs() < 1e-12);
    }

    #[test]
    fn model_failure_is_wrapped() {
        let schema = FeatureSchema::new(Vec::new());
        let a = ScoringAdapter::new(Arc::new(MeanModel {
            schema,
            offset: 0.0,
        }));
        let r = FeatureRecord::new("A-3");
        match a.score(&r).unwrap_err() {
            EngineError::Model(ModelFailure(msg)) => assert_eq!(msg, "empty input"),
            other => panic!("expected Model, got {other:?}"),
        }
    }

    #[test]
    fn fingerprint_is_stable_and_value_sensitive() {
        let a = record_fingerprint(&record(0.8, 0.4));
        let b = record_fingerprint(&record(0.8, 0.4));
        let c = record_fingerprint(&record(0.8, 0.5));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }
}
