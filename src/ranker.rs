//! # Priority Ranker
//! Total order over open alerts: score descending, then alert id ascending
//! so equal scores cannot flap between reads.
//!
//! The ranker holds one entry per non-closed alert. It knows ids and
//! scores, nothing else; the registry resolves entries back to alerts.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::error::EngineError;

/// Ordering key: higher score first, ties broken by id ascending. Scores
/// are guaranteed finite by the scoring adapter, so `total_cmp` gives a
/// genuine total order.
#[derive(Debug, Clone)]
struct RankKey {
    score: f64,
    alert_id: String,
}

impl Ord for RankKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.alert_id.cmp(&other.alert_id))
    }
}

impl PartialOrd for RankKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RankKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankKey {}

/// One ranked queue entry.
#[derive(Debug, Clone, Serialize)]
pub struct RankedEntry {
    pub alert_id: String,
    pub score: f64,
}

/// Deterministically ordered triage queue.
#[derive(Debug, Default)]
pub struct PriorityRanker {
    order: BTreeSet<RankKey>,
    scores: HashMap<String, f64>,
}

impl PriorityRanker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Insert or reposition an alert. Replaces any previous entry for the
    /// same id, so each open alert appears exactly once.
    pub fn upsert(&mut self, alert_id: &str, score: f64) {
        if let Some(old) = self.scores.insert(alert_id.to_string(), score) {
            self.order.remove(&RankKey {
                score: old,
                alert_id: alert_id.to_string(),
            });
        }
        self.order.insert(RankKey {
            score,
            alert_id: alert_id.to_string(),
        });
    }

    /// Drop an alert from the queue; returns whether it was present.
    pub fn remove(&mut self, alert_id: &str) -> bool {
        match self.scores.remove(alert_id) {
            Some(score) => {
                self.order.remove(&RankKey {
                    score,
                    alert_id: alert_id.to_string(),
                });
                true
            }
            None => false,
        }
    }

    pub fn score_of(&self, alert_id: &str) -> Option<f64> {
        self.scores.get(alert_id).copied()
    }

    /// Highest-priority `n` entries. `top(0)` is an empty page, not "all".
    pub fn top(&self, n: usize) -> Vec<RankedEntry> {
        self.order
            .iter()
            .take(n)
            .map(|key| RankedEntry {
                alert_id: key.alert_id.clone(),
                score: key.score,
            })
            .collect()
    }

    /// Full queue in priority order.
    pub fn snapshot(&self) -> Vec<RankedEntry> {
        self.top(self.scores.len())
    }

    /// 1-based position of an alert in the current order.
    pub fn rank_of(&self, alert_id: &str) -> Result<usize, EngineError> {
        let score = self
            .scores
            .get(alert_id)
            .copied()
            .ok_or_else(|| EngineError::UnknownAlert {
                alert_id: alert_id.to_string(),
            })?;
        let key = RankKey {
            score,
            alert_id: alert_id.to_string(),
        };
        let position = self
            .order
            .iter()
            .position(|k| *k == key)
            .ok_or_else(|| EngineError::UnknownAlert {
                alert_id: alert_id.to_string(),
            })?;
        Ok(position + 1)
    }
}
