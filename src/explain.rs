//! # Explainer
//! Local, additive attribution for one alert's score. The explainer
//! refuses to explain a score the active model version did not produce
//! (`StaleScore`), verifies additivity before returning anything, and
//! orders contributions canonically so repeated calls render identically.

use std::sync::Arc;

use crate::alert::{Attribution, FeatureContribution, FeatureRecord, RiskScore};
use crate::error::{EngineError, ModelFailure};
use crate::scoring::{schema_values, FeatureSchema};

/// Tolerance for the additivity check, on the score scale.
pub const ADDITIVITY_EPSILON: f64 = 1e-3;

/// Opaque attribution capability paired with a scoring model.
///
/// For values aligned to `schema()` order the implementation returns one
/// signed contribution per feature such that `baseline() + sum` reproduces
/// the model score for those same values.
pub trait AttributionModel: Send + Sync {
    fn version(&self) -> &str;

    fn schema(&self) -> &FeatureSchema;

    /// Score-scale intercept shared by every alert.
    fn baseline(&self) -> f64;

    fn attribute_values(&self, values: &[f64]) -> Result<Vec<f64>, ModelFailure>;
}

/// Validated attribution path. Cheap to clone; shares the model.
#[derive(Clone)]
pub struct Explainer {
    model: Arc<dyn AttributionModel>,
}

impl Explainer {
    pub fn new(model: Arc<dyn AttributionModel>) -> Self {
        Self { model }
    }

    pub fn version(&self) -> &str {
        self.model.version()
    }

    /// Explain `score` for `record`. The score must carry the active model
    /// version; the registry re-scores before calling this when it does not.
    pub fn explain(
        &self,
        record: &FeatureRecord,
        score: &RiskScore,
    ) -> Result<Attribution, EngineError> {
        if score.model_version != self.model.version() {
            return Err(EngineError::StaleScore {
                score_version: score.model_version.clone(),
                active_version: self.model.version().to_string(),
            });
        }

        let schema = self.model.schema();
        let values = schema_values(schema, record)?;
        let raw = self.model.attribute_values(&values)?;
        if raw.len() != values.len() {
            return Err(EngineError::Model(ModelFailure(format!(
                "attribution returned {} contributions for {} features",
                raw.len(),
                values.len()
            ))));
        }
        if let Some(bad) = raw.iter().find(|c| !c.is_finite()) {
            return Err(EngineError::Model(ModelFailure(format!(
                "non-finite contribution: {bad}"
            ))));
        }

        let baseline = self.model.baseline();
        let total: f64 = baseline + raw.iter().sum::<f64>();
        if (total - score.value).abs() > ADDITIVITY_EPSILON {
            return Err(EngineError::Model(ModelFailure(format!(
                "attribution not additive: baseline {baseline:.6} + contributions {:.6} != score {:.6}",
                total - baseline,
                score.value
            ))));
        }

        let mut contributions: Vec<FeatureContribution> = schema
            .names()
            .iter()
            .zip(raw)
            .map(|(name, contribution)| FeatureContribution {
                feature: name.clone(),
                contribution,
            })
            .collect();
        sort_canonical(&mut contributions);

        Ok(Attribution {
            alert_id: record.alert_id.clone(),
            model_version: score.model_version.clone(),
            score: score.value,
            baseline,
            contributions,
        })
    }
}

/// Descending |contribution|; equal magnitudes ordered by feature name
/// ascending so rendering is stable.
fn sort_canonical(contributions: &mut [FeatureContribution]) {
    contributions.sort_by(|a, b| {
        b.contribution
            .abs()
            .total_cmp(&a.contribution.abs())
            .then_with(|| a.feature.cmp(&b.feature))
    });
}
