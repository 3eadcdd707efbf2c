//! # Model Bundle
//! Pairs the scoring and attribution capabilities for one deployed model
//! version and provides the swap point for hot installs.
//!
//! - `TriageModel` refuses version- or schema-mismatched pairs, so a score
//!   and its explanation always come from the same artifact.
//! - `ModelHandle` is the shared current-model cell the registry reads;
//!   `replace` is the raw loader seam, `AlertRegistry::install_model` the
//!   safe wrapper that re-scores the open set.
//! - `LinearModel` is the built-in deterministic reference model:
//!   `score = clamp(bias + Σ wᵢ·xᵢ)` over feed-normalized features. Loads
//!   from JSON; falls back to a compiled-in seed when no file is deployed.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{info, warn};

use crate::alert::clamp01;
use crate::error::ModelFailure;
use crate::explain::{AttributionModel, Explainer};
use crate::scoring::{FeatureSchema, ScoringAdapter, ScoringModel};

/// One deployed scoring + attribution pair, version- and schema-consistent
/// by construction.
#[derive(Clone)]
pub struct TriageModel {
    scoring: ScoringAdapter,
    explainer: Explainer,
}

impl TriageModel {
    /// Pair two independently loaded capabilities. Fails when their
    /// versions or schemas disagree; a mismatched pair could produce
    /// explanations inconsistent with scores.
    pub fn new(
        scoring: Arc<dyn ScoringModel>,
        attribution: Arc<dyn AttributionModel>,
    ) -> Result<Self, ModelFailure> {
        if scoring.version() != attribution.version() {
            return Err(ModelFailure(format!(
                "scoring/attribution version mismatch: `{}` vs `{}`",
                scoring.version(),
                attribution.version()
            )));
        }
        if scoring.schema() != attribution.schema() {
            return Err(ModelFailure(
                "scoring/attribution schema mismatch".to_string(),
            ));
        }
        Ok(Self {
            scoring: ScoringAdapter::new(scoring),
            explainer: Explainer::new(attribution),
        })
    }

    /// Bundle a linear model, which backs both capabilities at once.
    pub fn linear(model: LinearModel) -> Self {
        let shared = Arc::new(model);
        Self {
            scoring: ScoringAdapter::new(shared.clone()),
            explainer: Explainer::new(shared),
        }
    }

    pub fn version(&self) -> &str {
        self.scoring.version()
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.scoring.schema()
    }

    pub fn scoring(&self) -> &ScoringAdapter {
        &self.scoring
    }

    pub fn explainer(&self) -> &Explainer {
        &self.explainer
    }
}

// The capability traits are opaque, so derive is unavailable; report the
// identifying version instead.
impl fmt::Debug for TriageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriageModel")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

/// Swappable current-model cell shared between the registry and the
/// loader. Reads take a cheap snapshot; operations hold the snapshot, not
/// the lock, for their duration.
#[derive(Clone)]
pub struct ModelHandle {
    inner: Arc<RwLock<Arc<TriageModel>>>,
}

impl ModelHandle {
    pub fn new(model: TriageModel) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(model))),
        }
    }

    /// Snapshot of the active model.
    pub fn current(&self) -> Arc<TriageModel> {
        self.inner.read().clone()
    }

    /// Raw swap, returning the previous model. Callers other than the
    /// registry's `install_model` are responsible for re-scoring.
    pub fn replace(&self, model: TriageModel) -> Arc<TriageModel> {
        let mut guard = self.inner.write();
        let previous = guard.clone();
        *guard = Arc::new(model);
        previous
    }

    pub fn version(&self) -> String {
        self.current().version().to_string()
    }
}

/// On-disk shape of a linear model file.
#[derive(Debug, Clone, Deserialize)]
struct LinearModelFile {
    version: String,
    #[serde(default)]
    bias: f64,
    #[serde(default)]
    weights: BTreeMap<String, f64>,
}

/// Deterministic linear risk model: per-feature weights plus a bias on the
/// score scale. Output is clamped to `[0, 1]`; when the clamp engages,
/// contributions are rescaled proportionally so additivity stays exact.
#[derive(Debug, Clone)]
pub struct LinearModel {
    version: String,
    bias: f64,
    weights: BTreeMap<String, f64>,
    schema: FeatureSchema,
}

impl LinearModel {
    pub fn new(version: impl Into<String>, bias: f64, weights: BTreeMap<String, f64>) -> Self {
        let schema = FeatureSchema::new(weights.keys().cloned().collect());
        Self {
            version: version.into(),
            // the intercept lives on the score scale
            bias: clamp01(bias),
            weights,
            schema,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let file: LinearModelFile = serde_json::from_str(raw)?;
        Ok(Self::new(file.version, file.bias, file.weights))
    }

    /// Load from a JSON file. Falls back to `default_seed()` when the file
    /// is absent or malformed, logging which source was used.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(raw) => match Self::from_json_str(&raw) {
                Ok(model) => {
                    info!(
                        "risk model loaded from {} (version {})",
                        path.display(),
                        model.version
                    );
                    model
                }
                Err(err) => {
                    warn!(
                        "risk model file {} unreadable ({err}); using default seed",
                        path.display()
                    );
                    Self::default_seed()
                }
            },
            Err(_) => {
                info!(
                    "risk model file {} not found; using default seed",
                    path.display()
                );
                Self::default_seed()
            }
        }
    }

    /// Built-in SIEM-flavored seed used when no model file is deployed.
    /// Weights assume feed-normalized feature values in `[0, 1]`.
    pub fn default_seed() -> Self {
        let mut weights = BTreeMap::new();
        for (name, weight) in [
            ("login_failures", 0.22),
            ("privilege_escalations", 0.30),
            ("off_hours_activity", 0.12),
            ("bytes_exfiltrated", 0.26),
            ("distinct_dest_hosts", 0.10),
            ("malware_indicators", 0.28),
        ] {
            weights.insert(name.to_string(), weight);
        }
        Self::new("seed-linear-1", 0.03, weights)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Affine output before clamping. Weights iterate name-sorted, which
    /// matches schema order.
    fn raw(&self, values: &[f64]) -> f64 {
        self.bias
            + self
                .weights
                .values()
                .zip(values)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    fn check_len(&self, values: &[f64]) -> Result<(), ModelFailure> {
        if values.len() != self.schema.len() {
            return Err(ModelFailure(format!(
                "expected {} values, got {}",
                self.schema.len(),
                values.len()
            )));
        }
        Ok(())
    }
}

impl ScoringModel for LinearModel {
    fn version(&self) -> &str {
        &self.version
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn score_values(&self, values: &[f64]) -> Result<f64, ModelFailure> {
        self.check_len(values)?;
        Ok(clamp01(self.raw(values)))
    }
}

impl AttributionModel for LinearModel {
    fn version(&self) -> &str {
        &self.version
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn baseline(&self) -> f64 {
        self.bias
    }

    fn attribute_values(&self, values: &[f64]) -> Result<Vec<f64>, ModelFailure> {
        self.check_len(values)?;
        let raw = self.raw(values);
        let clamped = clamp01(raw);
        let mut contributions: Vec<f64> = self
            .weights
            .values()
            .zip(values)
            .map(|(w, x)| w * x)
            .collect();

        // Clamping breaks raw additivity; project the contributions onto
        // the clamped score so baseline + sum still lands exactly on it.
        let spread = raw - self.bias;
        if clamped != raw && spread.abs() > f64::EPSILON {
            let scale = (clamped - self.bias) / spread;
            for c in &mut contributions {
                *c *= scale;
            }
        }
        Ok(contributions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{FeatureRecord, RiskScore};

    fn two_feature_model(w_a: f64, w_b: f64, bias: f64, version: &str) -> LinearModel {
        let mut weights = BTreeMap::new();
        weights.insert("a".to_string(), w_a);
        weights.insert("b".to_string(), w_b);
        LinearModel::new(version, bias, weights)
    }

    fn record(a: f64, b: f64) -> FeatureRecord {
        FeatureRecord::new("A-1")
            .with_feature("a", a)
            .with_feature("b", b)
    }

    #[test]
    fn seed_model_scores_the_canonical_features() {
        let model = LinearModel::default_seed();
        assert_eq!(model.version(), "seed-linear-1");
        assert!(ScoringModel::schema(&model)
            .names()
            .iter()
            .any(|n| n == "login_failures"));
    }

    #[test]
    fn json_round_trip_builds_a_scoring_schema() {
        let model = LinearModel::from_json_str(
            r#"{
                "version": "prod-2025.08",
                "bias": 0.05,
                "weights": { "login_failures": 0.4, "bytes_exfiltrated": 0.5 }
            }"#,
        )
        .unwrap();
        assert_eq!(model.version(), "prod-2025.08");
        assert_eq!(
            ScoringModel::schema(&model).names(),
            &["bytes_exfiltrated".to_string(), "login_failures".to_string()]
        );
    }

    #[test]
    fn linear_score_is_affine_then_bounded() {
        let model = two_feature_model(0.5, 0.5, 0.1, "v1");
        let score = model.score_values(&[0.4, 0.2]).unwrap();
        assert!((score - 0.4).abs() < 1e-12);
        let over = model.score_values(&[2.0, 2.0]).unwrap();
        assert!((over - 1.0).abs() < 1e-12);
    }

    #[test]
    fn attribution_stays_additive_under_clamping() {
        let model = two_feature_model(0.8, 0.8, 0.1, "v1");
        let values = [1.0, 1.0]; // raw = 1.7, clamped to 1.0
        let score = model.score_values(&values).unwrap();
        let contributions = model.attribute_values(&values).unwrap();
        let total = AttributionModel::baseline(&model) + contributions.iter().sum::<f64>();
        assert!((total - score).abs() < 1e-9, "total {total} vs score {score}");
        // proportionality is preserved
        assert!((contributions[0] - contributions[1]).abs() < 1e-12);
    }

    #[test]
    fn bundle_explains_its_own_scores() {
        let triage = TriageModel::linear(two_feature_model(0.5, 0.3, 0.0, "v1"));
        let r = record(0.6, 0.5);
        let score = triage.scoring().score(&r).unwrap();
        let att = triage.explainer().explain(&r, &score).unwrap();
        let total = att.baseline + att.contributions.iter().map(|c| c.contribution).sum::<f64>();
        assert!((total - score.value).abs() < 1e-9);
    }

    #[test]
    fn mismatched_pair_is_refused() {
        let scoring = Arc::new(two_feature_model(0.5, 0.3, 0.0, "v1"));
        let attribution = Arc::new(two_feature_model(0.5, 0.3, 0.0, "v2"));
        let err = TriageModel::new(scoring, attribution).unwrap_err();
        assert!(err.0.contains("version mismatch"), "{}", err.0);
    }

    #[test]
    fn explainer_rejects_scores_from_a_replaced_model() {
        let handle = ModelHandle::new(TriageModel::linear(two_feature_model(
            0.5, 0.3, 0.0, "v1",
        )));
        let r = record(0.6, 0.5);
        let old_score: RiskScore = handle.current().scoring().score(&r).unwrap();

        handle.replace(TriageModel::linear(two_feature_model(0.2, 0.2, 0.0, "v2")));
        assert_eq!(handle.version(), "v2");

        let err = handle
            .current()
            .explainer()
            .explain(&r, &old_score)
            .unwrap_err();
        assert_eq!(err.kind(), "stale_score");
    }
}
