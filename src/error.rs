//! # Error Taxonomy
//! Typed failures for the triage engine.
//!
//! - Malformed input (`FeatureMismatch`, `InvalidFeatureValue`) is always
//!   surfaced to the caller, never repaired.
//! - Registry state-machine misuse (`DuplicateAlert`, `UnknownAlert`,
//!   `ClosedAlert`) is the caller's responsibility.
//! - `StaleScore` is a consistency guard between the explainer and the
//!   active model version; the registry resolves it by re-scoring.
//! - Opaque model failures arrive wrapped in `Model`, so monitoring can
//!   tell bad input apart from a broken model.

use thiserror::Error;

/// Similarity floor for the "did you mean" hint on mismatched feature names.
const NAME_HINT_THRESHOLD: f64 = 0.8;

/// Failure raised inside an opaque scoring or attribution implementation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct ModelFailure(pub String);

/// All failures the triage engine can produce.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Feature names do not exactly match the loaded model's schema.
    #[error("{}", feature_mismatch_message(.missing, .unexpected))]
    FeatureMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// A feature carries a non-finite numeric value.
    #[error("invalid value for feature `{feature}`: {value}")]
    InvalidFeatureValue { feature: String, value: f64 },

    /// The alert id is already registered and not closed.
    #[error("alert `{alert_id}` is already registered")]
    DuplicateAlert { alert_id: String },

    /// The alert id is not registered.
    #[error("unknown alert `{alert_id}`")]
    UnknownAlert { alert_id: String },

    /// The alert is closed; closed alerts accept no further operations.
    #[error("alert `{alert_id}` is closed")]
    ClosedAlert { alert_id: String },

    /// The score was produced by a model version other than the active one.
    #[error(
        "score from model version `{score_version}` is stale (active version is `{active_version}`)"
    )]
    StaleScore {
        score_version: String,
        active_version: String,
    },

    /// Wrapped internal failure from the opaque model.
    #[error("model internal error: {0}")]
    Model(#[from] ModelFailure),
}

impl EngineError {
    /// Stable snake_case discriminator, used in API error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::FeatureMismatch { .. } => "feature_mismatch",
            EngineError::InvalidFeatureValue { .. } => "invalid_feature_value",
            EngineError::DuplicateAlert { .. } => "duplicate_alert",
            EngineError::UnknownAlert { .. } => "unknown_alert",
            EngineError::ClosedAlert { .. } => "closed_alert",
            EngineError::StaleScore { .. } => "stale_score",
            EngineError::Model(_) => "model_internal",
        }
    }
}

/// Render the mismatch with both name lists and, where an unexpected name
/// closely resembles a missing one, a typo hint for the feed author.
fn feature_mismatch_message(missing: &[String], unexpected: &[String]) -> String {
    let mut msg = String::from("feature set does not match the model schema");
    if !missing.is_empty() {
        msg.push_str(&format!("; missing: [{}]", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        msg.push_str(&format!("; unexpected: [{}]", unexpected.join(", ")));
    }
    for (got, want) in name_hints(missing, unexpected) {
        msg.push_str(&format!("; did you mean `{want}` instead of `{got}`?"));
    }
    msg
}

/// Pair each unexpected name with the most similar missing name, if any
/// clears the similarity floor.
fn name_hints<'a>(missing: &'a [String], unexpected: &'a [String]) -> Vec<(&'a str, &'a str)> {
    let mut hints = Vec::new();
    for got in unexpected {
        let mut best: Option<(&str, f64)> = None;
        for want in missing {
            let sim = strsim::normalized_levenshtein(got, want);
            if sim >= NAME_HINT_THRESHOLD && best.map(|(_, s)| sim > s).unwrap_or(true) {
                best = Some((want.as_str(), sim));
            }
        }
        if let Some((want, _)) = best {
            hints.push((got.as_str(), want));
        }
    }
    hints
}
