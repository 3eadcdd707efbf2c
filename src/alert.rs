//! # Alert Data Model
//! Domain types for triage: feature records, risk scores and levels, local
//! attributions, the alert aggregate, and the snapshot shape the dashboard
//! consumes. Pure data; behavior lives in `scoring`, `explain`, `ranker`
//! and `registry`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mitre::MitreAnnotation;

/// Immutable feature snapshot for one alert, as consumed by the risk model.
///
/// `features` maps feature name to numeric value; a `BTreeMap` keeps the
/// iteration order stable, which keeps scoring and attribution reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub alert_id: String,
    pub features: BTreeMap<String, f64>,
}

impl FeatureRecord {
    pub fn new(alert_id: impl Into<String>) -> Self {
        Self {
            alert_id: alert_id.into(),
            features: BTreeMap::new(),
        }
    }

    /// Add one feature (builder style).
    pub fn with_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.features.insert(name.into(), value);
        self
    }
}

/// Bounded risk estimate in `[0.0, 1.0]`, paired with the version of the
/// model that produced it. The pairing is what lets the explainer refuse
/// to explain a score the active model did not compute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub value: f64,
    pub model_version: String,
}

impl RiskScore {
    pub fn new(value: f64, model_version: impl Into<String>) -> Self {
        Self {
            value: clamp01(value),
            model_version: model_version.into(),
        }
    }
}

/// Banding thresholds for presentation. Defaults mirror the triage
/// convention: HIGH at 0.70, MEDIUM at 0.45.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    #[serde(default = "default_high")]
    pub high: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
}

fn default_high() -> f64 {
    0.70
}

fn default_medium() -> f64 {
    0.45
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high: default_high(),
            medium: default_medium(),
        }
    }
}

/// Severity band shown to analysts. Never part of ordering; the ranker
/// orders by raw score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn from_score(score: f64, thresholds: &RiskThresholds) -> Self {
        if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one alert. `Closed` is terminal: no further scoring,
/// ranking, or explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    New,
    Scored,
    UnderReview,
    Closed,
}

impl AlertStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::New => "NEW",
            AlertStatus::Scored => "SCORED",
            AlertStatus::UnderReview => "UNDER_REVIEW",
            AlertStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional non-numeric context carried alongside a feature record.
/// Informational only; plays no part in scoring or ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertContext {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alert_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_host: String,
}

/// One feature's signed contribution to an alert's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: f64,
}

/// Local, additive explanation of one alert's score: baseline plus the sum
/// of contributions reconstructs the score within the explainer tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub alert_id: String,
    pub model_version: String,
    pub score: f64,
    pub baseline: f64,
    /// Sorted by descending |contribution|, ties by feature name ascending.
    pub contributions: Vec<FeatureContribution>,
}

impl Attribution {
    /// Human-readable lines for the top `n` contributions, strongest first.
    pub fn summary(&self, n: usize) -> Vec<String> {
        self.contributions
            .iter()
            .take(n)
            .map(|c| {
                let direction = if c.contribution >= 0.0 {
                    "raised"
                } else {
                    "lowered"
                };
                format!(
                    "{} {} the score by {:+.3}",
                    c.feature, direction, c.contribution
                )
            })
            .collect()
    }
}

/// Mutable aggregate owned by the registry. The ranker never holds a copy
/// of this state, only (alert_id, score) pairs.
#[derive(Debug, Clone)]
pub struct Alert {
    pub record: FeatureRecord,
    pub context: AlertContext,
    pub status: AlertStatus,
    pub score: RiskScore,
    pub cached_attribution: Option<Attribution>,
    pub ingested_at: DateTime<Utc>,
    pub scored_at: DateTime<Utc>,
}

impl Alert {
    /// Fresh aggregate in `New`; `apply_score` moves it to `Scored`.
    pub fn new(record: FeatureRecord, context: AlertContext) -> Self {
        let now = Utc::now();
        Self {
            record,
            context,
            status: AlertStatus::New,
            score: RiskScore::new(0.0, ""),
            cached_attribution: None,
            ingested_at: now,
            scored_at: now,
        }
    }

    /// Install a fresh score: replaces the current score, drops any cached
    /// attribution, and completes the New → Scored transition on first use.
    /// Scored/UnderReview keep their status.
    pub fn apply_score(&mut self, score: RiskScore) {
        self.score = score;
        self.cached_attribution = None;
        self.scored_at = Utc::now();
        if self.status == AlertStatus::New {
            self.status = AlertStatus::Scored;
        }
    }
}

/// Read-only presentation shape resolved from an `Alert` for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSnapshot {
    pub alert_id: String,
    pub score: f64,
    pub risk_level: RiskLevel,
    pub status: AlertStatus,
    pub model_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitre: Option<MitreAnnotation>,
    pub context: AlertContext,
    pub scored_at: DateTime<Utc>,
    /// 1-based queue position; absent for closed alerts and bulk listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

/// Clamp to [0.0, 1.0].
pub(crate) fn clamp01(x: f64) -> f64 {
    if x < 0.0 {
        0.0
    } else if x > 1.0 {
        1.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn risk_level_banding_matches_thresholds() {
        let t = RiskThresholds::default();
        assert_eq!(RiskLevel::from_score(0.92, &t), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.70, &t), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.699, &t), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.45, &t), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.449, &t), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.0, &t), RiskLevel::Low);
    }

    #[test]
    fn risk_score_is_clamped_on_construction() {
        assert!((RiskScore::new(1.7, "v1").value - 1.0).abs() < 1e-12);
        assert!((RiskScore::new(-0.2, "v1").value).abs() < 1e-12);
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let v = serde_json::to_value(AlertStatus::UnderReview).unwrap();
        assert_eq!(v, json!("UNDER_REVIEW"));
        assert!(AlertStatus::Closed.is_terminal());
        assert!(!AlertStatus::Scored.is_terminal());
    }

    #[test]
    fn snapshot_shape_matches_dashboard_contract() {
        let snap = AlertSnapshot {
            alert_id: "SIEM-1042".into(),
            score: 0.83,
            risk_level: RiskLevel::High,
            status: AlertStatus::Scored,
            model_version: "seed-linear-1".into(),
            mitre: None,
            context: AlertContext {
                alert_type: "BRUTE_FORCE".into(),
                user: "svc_backup".into(),
                destination_host: "db-03".into(),
            },
            scored_at: Utc::now(),
            rank: Some(1),
        };
        let v = serde_json::to_value(&snap).unwrap();
        assert_eq!(v["alert_id"], json!("SIEM-1042"));
        assert_eq!(v["risk_level"], json!("HIGH"));
        assert_eq!(v["status"], json!("SCORED"));
        assert_eq!(v["context"]["destination_host"], json!("db-03"));
        assert_eq!(v["rank"], json!(1));
        assert!(v.get("mitre").is_none(), "absent mitre must not serialize");
    }

    #[test]
    fn apply_score_advances_new_and_clears_cache() {
        let record = FeatureRecord::new("A-1").with_feature("login_failures", 0.4);
        let mut alert = Alert::new(record, AlertContext::default());
        assert_eq!(alert.status, AlertStatus::New);

        alert.apply_score(RiskScore::new(0.6, "v1"));
        assert_eq!(alert.status, AlertStatus::Scored);

        alert.cached_attribution = Some(Attribution {
            alert_id: "A-1".into(),
            model_version: "v1".into(),
            score: 0.6,
            baseline: 0.0,
            contributions: Vec::new(),
        });
        alert.status = AlertStatus::UnderReview;
        alert.apply_score(RiskScore::new(0.2, "v1"));
        assert_eq!(alert.status, AlertStatus::UnderReview, "rescore keeps status");
        assert!(alert.cached_attribution.is_none(), "rescore drops the cache");
    }

    #[test]
    fn summary_reports_direction_and_magnitude() {
        let att = Attribution {
            alert_id: "A-1".into(),
            model_version: "v1".into(),
            score: 0.5,
            baseline: 0.1,
            contributions: vec![
                FeatureContribution {
                    feature: "login_failures".into(),
                    contribution: 0.31,
                },
                FeatureContribution {
                    feature: "off_hours_activity".into(),
                    contribution: -0.02,
                },
            ],
        };
        let lines = att.summary(5);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "login_failures raised the score by +0.310");
        assert_eq!(lines[1], "off_hours_activity lowered the score by -0.020");
    }
}
