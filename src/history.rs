//! # Event Log
//! Bounded in-memory log of triage lifecycle events for the debug surface.
//! Entries carry ids, scores, and versions only; raw feature values never
//! land here.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// What happened to an alert (or to the model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageEventKind {
    Ingested,
    Rescored,
    Explained,
    Closed,
    ModelInstalled,
}

/// One lifecycle event. Optional fields are filled per kind.
#[derive(Debug, Clone, Serialize)]
pub struct TriageEvent {
    pub at: DateTime<Utc>,
    pub kind: TriageEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescored: Option<usize>,
}

impl TriageEvent {
    fn base(kind: TriageEventKind) -> Self {
        Self {
            at: Utc::now(),
            kind,
            alert_id: None,
            score: None,
            previous_score: None,
            model_version: None,
            rescored: None,
        }
    }

    pub fn ingested(alert_id: &str, score: f64) -> Self {
        let mut e = Self::base(TriageEventKind::Ingested);
        e.alert_id = Some(alert_id.to_string());
        e.score = Some(score);
        e
    }

    pub fn rescored(alert_id: &str, previous: f64, score: f64) -> Self {
        let mut e = Self::base(TriageEventKind::Rescored);
        e.alert_id = Some(alert_id.to_string());
        e.previous_score = Some(previous);
        e.score = Some(score);
        e
    }

    pub fn explained(alert_id: &str) -> Self {
        let mut e = Self::base(TriageEventKind::Explained);
        e.alert_id = Some(alert_id.to_string());
        e
    }

    pub fn closed(alert_id: &str) -> Self {
        let mut e = Self::base(TriageEventKind::Closed);
        e.alert_id = Some(alert_id.to_string());
        e
    }

    pub fn model_installed(version: &str, rescored: usize) -> Self {
        let mut e = Self::base(TriageEventKind::ModelInstalled);
        e.model_version = Some(version.to_string());
        e.rescored = Some(rescored);
        e
    }
}

/// Capped event buffer; oldest entries are evicted first.
#[derive(Debug)]
pub struct EventLog {
    inner: Mutex<Vec<TriageEvent>>,
    cap: usize,
}

impl EventLog {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.min(10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, event: TriageEvent) {
        let mut v = self.inner.lock();
        v.push(event);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    /// Most recent `n` events, newest first.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<TriageEvent> {
        let v = self.inner.lock();
        let start = v.len().saturating_sub(n);
        v[start..].iter().rev().cloned().collect()
    }
}
