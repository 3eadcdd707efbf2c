//! # Alert Registry
//! Owns the alert set, the priority queue, and the active model; every
//! triage operation goes through here.
//!
//! Concurrency layout: the id map is under a short-lived `RwLock`, each
//! alert behind its own `RwLock`, and the ranker behind one narrow
//! `Mutex`. Operations on different alerts run in parallel; an operation
//! touches only its alert's lock plus brief ranker updates.
//!
//! Lock order is map, then alert, then ranker, never the reverse. Queue
//! reads take a ranker snapshot and release the ranker before resolving
//! alerts, so a snapshot can be momentarily behind a concurrent close.
//!
//! Score writes read the active model from inside the alert's critical
//! section, and ingest re-checks the version once its insert is visible.
//! A model install therefore either happens before that read or finds
//! the alert during its sweep; the queue never keeps a retired version
//! durably.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alert::{
    Alert, AlertContext, AlertSnapshot, AlertStatus, Attribution, FeatureRecord, RiskLevel,
    RiskThresholds,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, ModelFailure};
use crate::history::{EventLog, TriageEvent};
use crate::mitre;
use crate::model::{ModelHandle, TriageModel};
use crate::ranker::{PriorityRanker, RankedEntry};
use crate::rolling::{RollingRisk, RollingStats};

/// How many destination hosts `/stats` reports.
const TOP_HOSTS: usize = 5;

/// Outcome of a model install: the new version and how many open alerts
/// the sweep re-scored.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInstallReport {
    pub version: String,
    pub rescored: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LevelCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HostCount {
    pub host: String,
    pub count: usize,
}

/// Operational overview served by `/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct TriageStats {
    pub open_alerts: usize,
    pub by_level: LevelCounts,
    pub top_hosts: Vec<HostCount>,
    pub rolling: RollingStats,
}

pub struct AlertRegistry {
    alerts: RwLock<HashMap<String, Arc<RwLock<Alert>>>>,
    ranker: Mutex<PriorityRanker>,
    model: ModelHandle,
    events: EventLog,
    rolling: RollingRisk,
    thresholds: RiskThresholds,
}

impl AlertRegistry {
    pub fn new(model: TriageModel, config: &EngineConfig) -> Self {
        Self::with_handle(ModelHandle::new(model), config)
    }

    /// Share a model handle with an external loader. The loader is then
    /// responsible for installing through [`AlertRegistry::install_model`];
    /// raw `replace` leaves open alerts stale until their next read.
    pub fn with_handle(model: ModelHandle, config: &EngineConfig) -> Self {
        Self {
            alerts: RwLock::new(HashMap::new()),
            ranker: Mutex::new(PriorityRanker::new()),
            model,
            events: EventLog::with_capacity(config.history.capacity),
            rolling: RollingRisk::new_24h(),
            thresholds: config.thresholds,
        }
    }

    pub fn model_version(&self) -> String {
        self.model.version()
    }

    pub fn open_alerts(&self) -> usize {
        self.ranker.lock().len()
    }

    fn lookup(&self, alert_id: &str) -> Result<Arc<RwLock<Alert>>, EngineError> {
        self.alerts
            .read()
            .get(alert_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownAlert {
                alert_id: alert_id.to_string(),
            })
    }

    /// Score a new alert and place it in the queue. Rejected records leave
    /// no trace. An id already open is a duplicate; an id closed earlier
    /// may be reused and replaces the closed entry.
    pub fn ingest(
        &self,
        record: FeatureRecord,
        context: AlertContext,
    ) -> Result<AlertSnapshot, EngineError> {
        let model = self.model.current();
        let score = model.scoring().score(&record)?;
        let alert_id = record.alert_id.clone();

        let (handle, mut snapshot) = {
            let mut alerts = self.alerts.write();
            if let Some(existing) = alerts.get(&alert_id) {
                if !existing.read().status.is_terminal() {
                    return Err(EngineError::DuplicateAlert { alert_id });
                }
            }
            let mut alert = Alert::new(record, context);
            alert.apply_score(score);
            let value = alert.score.value;
            let rank = {
                let mut ranker = self.ranker.lock();
                ranker.upsert(&alert_id, value);
                ranker.rank_of(&alert_id).ok()
            };
            let snapshot = self.snapshot_of(&alert, rank);
            let handle = Arc::new(RwLock::new(alert));
            alerts.insert(alert_id.clone(), handle.clone());
            (handle, snapshot)
        };

        // An install that swapped while the record was being scored above
        // sweeps the map before this insert and misses the new entry.
        // Re-check now that the alert is visible and repair in place.
        if snapshot.model_version != self.model.current().version() {
            if let Some(fresh) = self.refresh_in_place(&alert_id, &handle) {
                snapshot = fresh;
            }
        }

        self.rolling.record(snapshot.score, None);
        self.events
            .push(TriageEvent::ingested(&alert_id, snapshot.score));
        counter!("triage_alerts_ingested_total").increment(1);
        self.update_open_gauge();
        info!(
            alert_id = %alert_id,
            score = snapshot.score,
            version = %snapshot.model_version,
            "alert ingested"
        );
        Ok(snapshot)
    }

    /// Bring one alert to the active version when its score lags behind.
    /// The model is read from inside the alert's critical section: an
    /// install that swaps after that read runs its sweep after this write
    /// completes, and the sweep finds the alert in the map.
    fn refresh_in_place(
        &self,
        alert_id: &str,
        handle: &Arc<RwLock<Alert>>,
    ) -> Option<AlertSnapshot> {
        let mut alert = handle.write();
        if alert.status.is_terminal() {
            return None;
        }
        let model = self.model.current();
        if alert.score.model_version == model.version() {
            return None;
        }
        match model.scoring().score(&alert.record) {
            Ok(score) => {
                let value = score.value;
                alert.apply_score(score);
                let rank = {
                    let mut ranker = self.ranker.lock();
                    ranker.upsert(alert_id, value);
                    ranker.rank_of(alert_id).ok()
                };
                debug!(
                    alert_id = %alert_id,
                    version = %model.version(),
                    "alert re-scored to the active model"
                );
                Some(self.snapshot_of(&alert, rank))
            }
            Err(err) => {
                // left stale; the explanation path re-scores it lazily
                warn!(alert_id = %alert_id, %err, "re-score failed after model swap");
                None
            }
        }
    }

    /// Re-run the active model over an alert's stored features. Replaces
    /// the score, drops any cached attribution, and repositions the alert
    /// in the queue, all under the alert's lock. The model is read under
    /// that lock as well, so an install sweep that already visited this
    /// alert cannot be trailed by a write from the retired version.
    pub fn rescore(&self, alert_id: &str) -> Result<AlertSnapshot, EngineError> {
        let handle = self.lookup(alert_id)?;

        let (snapshot, previous, value) = {
            let mut alert = handle.write();
            if alert.status.is_terminal() {
                return Err(EngineError::ClosedAlert {
                    alert_id: alert_id.to_string(),
                });
            }
            let model = self.model.current();
            let score = model.scoring().score(&alert.record)?;
            let previous = alert.score.value;
            let value = score.value;
            alert.apply_score(score);
            let rank = {
                let mut ranker = self.ranker.lock();
                ranker.upsert(alert_id, value);
                ranker.rank_of(alert_id).ok()
            };
            (self.snapshot_of(&alert, rank), previous, value)
        };

        self.rolling.record(value, None);
        self.events.push(TriageEvent::rescored(alert_id, previous, value));
        counter!("triage_rescores_total").increment(1);
        debug!(alert_id = %alert_id, previous, score = value, "alert re-scored");
        Ok(snapshot)
    }

    /// Attribution for an alert's current score. Serves the cache when it
    /// matches the active model version; a score from a retired version is
    /// re-scored here first, so staleness never reaches the caller.
    pub fn get_explanation(&self, alert_id: &str) -> Result<Attribution, EngineError> {
        let handle = self.lookup(alert_id)?;

        let attribution = {
            let mut alert = handle.write();
            if alert.status.is_terminal() {
                return Err(EngineError::ClosedAlert {
                    alert_id: alert_id.to_string(),
                });
            }
            let model = self.model.current();

            let cached = alert
                .cached_attribution
                .as_ref()
                .filter(|a| a.model_version == model.version())
                .cloned();
            if let Some(cached) = cached {
                counter!("triage_explanation_cache_hits_total").increment(1);
                if alert.status == AlertStatus::Scored {
                    alert.status = AlertStatus::UnderReview;
                }
                cached
            } else {
                if alert.score.model_version != model.version() {
                    let previous = alert.score.value;
                    let score = model.scoring().score(&alert.record)?;
                    let value = score.value;
                    alert.apply_score(score);
                    self.ranker.lock().upsert(alert_id, value);
                    self.events
                        .push(TriageEvent::rescored(alert_id, previous, value));
                    counter!("triage_rescores_total").increment(1);
                    debug!(
                        alert_id = %alert_id,
                        previous,
                        score = value,
                        "re-scored under the active model before explaining"
                    );
                }
                let attribution = model.explainer().explain(&alert.record, &alert.score)?;
                alert.cached_attribution = Some(attribution.clone());
                if alert.status == AlertStatus::Scored {
                    alert.status = AlertStatus::UnderReview;
                }
                attribution
            }
        };

        self.events.push(TriageEvent::explained(alert_id));
        counter!("triage_explanations_total").increment(1);
        Ok(attribution)
    }

    /// Move an alert to its terminal state and drop it from the queue.
    pub fn close(&self, alert_id: &str) -> Result<AlertSnapshot, EngineError> {
        let handle = self.lookup(alert_id)?;
        let snapshot = {
            let mut alert = handle.write();
            if alert.status.is_terminal() {
                return Err(EngineError::ClosedAlert {
                    alert_id: alert_id.to_string(),
                });
            }
            alert.status = AlertStatus::Closed;
            self.ranker.lock().remove(alert_id);
            self.snapshot_of(&alert, None)
        };

        self.events.push(TriageEvent::closed(alert_id));
        counter!("triage_alerts_closed_total").increment(1);
        self.update_open_gauge();
        info!(alert_id = %alert_id, "alert closed");
        Ok(snapshot)
    }

    /// Highest-priority open alerts, score descending with id ascending on
    /// ties. `top_priority(0)` is an empty page.
    pub fn top_priority(&self, n: usize) -> Vec<AlertSnapshot> {
        let entries = self.ranker.lock().top(n);
        self.resolve(&entries)
    }

    /// Queue page restricted to one risk level. Filters the full order
    /// first, then truncates, so a page is never short while matching
    /// alerts exist further down. Ranks stay global.
    pub fn top_priority_by_level(&self, n: usize, level: RiskLevel) -> Vec<AlertSnapshot> {
        let entries = self.ranker.lock().snapshot();
        self.resolve(&entries)
            .into_iter()
            .filter(|s| s.risk_level == level)
            .take(n)
            .collect()
    }

    fn resolve(&self, entries: &[RankedEntry]) -> Vec<AlertSnapshot> {
        let alerts = self.alerts.read();
        entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| {
                let handle = alerts.get(&entry.alert_id)?;
                let alert = handle.read();
                if alert.status.is_terminal() {
                    return None; // closed after the ranker snapshot was taken
                }
                Some(self.snapshot_of(&alert, Some(i + 1)))
            })
            .collect()
    }

    /// Current state of one alert, with its queue rank while open.
    pub fn get(&self, alert_id: &str) -> Result<AlertSnapshot, EngineError> {
        let handle = self.lookup(alert_id)?;
        let alert = handle.read();
        let rank = if alert.status.is_terminal() {
            None
        } else {
            self.ranker.lock().rank_of(alert_id).ok()
        };
        Ok(self.snapshot_of(&alert, rank))
    }

    /// 1-based queue position of an open alert.
    pub fn rank_of(&self, alert_id: &str) -> Result<usize, EngineError> {
        self.ranker.lock().rank_of(alert_id)
    }

    /// Install a new model version: swap the handle, then re-score every
    /// open alert so the queue never mixes versions. The new model must
    /// keep the active feature schema, or stored records could no longer
    /// be scored.
    pub fn install_model(&self, model: TriageModel) -> Result<ModelInstallReport, EngineError> {
        {
            let active = self.model.current();
            if model.schema() != active.schema() {
                return Err(ModelFailure(
                    "installed model must keep the active feature schema".to_string(),
                )
                .into());
            }
        }
        let version = model.version().to_string();
        self.model.replace(model);
        let model = self.model.current();

        let handles: Vec<(String, Arc<RwLock<Alert>>)> = {
            let alerts = self.alerts.read();
            alerts
                .iter()
                .map(|(id, handle)| (id.clone(), handle.clone()))
                .collect()
        };

        let mut rescored = 0usize;
        for (id, handle) in handles {
            let mut alert = handle.write();
            if alert.status.is_terminal() || alert.score.model_version == version {
                continue;
            }
            match model.scoring().score(&alert.record) {
                Ok(score) => {
                    let value = score.value;
                    alert.apply_score(score);
                    self.ranker.lock().upsert(&id, value);
                    rescored += 1;
                }
                Err(err) => {
                    // left stale; the explanation path re-scores it lazily
                    warn!(alert_id = %id, %err, "re-score failed during model install");
                }
            }
        }

        self.events
            .push(TriageEvent::model_installed(&version, rescored));
        counter!("triage_model_installs_total").increment(1);
        info!(version = %version, rescored, "model installed");
        Ok(ModelInstallReport { version, rescored })
    }

    /// Operational overview of the open alert set.
    pub fn stats(&self) -> TriageStats {
        let mut by_level = LevelCounts::default();
        let mut hosts: HashMap<String, usize> = HashMap::new();
        let mut open = 0usize;
        {
            let alerts = self.alerts.read();
            for handle in alerts.values() {
                let alert = handle.read();
                if alert.status.is_terminal() {
                    continue;
                }
                open += 1;
                match RiskLevel::from_score(alert.score.value, &self.thresholds) {
                    RiskLevel::High => by_level.high += 1,
                    RiskLevel::Medium => by_level.medium += 1,
                    RiskLevel::Low => by_level.low += 1,
                }
                let host = alert.context.destination_host.trim();
                if !host.is_empty() {
                    *hosts.entry(host.to_string()).or_insert(0) += 1;
                }
            }
        }

        let mut top_hosts: Vec<HostCount> = hosts
            .into_iter()
            .map(|(host, count)| HostCount { host, count })
            .collect();
        top_hosts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.host.cmp(&b.host)));
        top_hosts.truncate(TOP_HOSTS);

        TriageStats {
            open_alerts: open,
            by_level,
            top_hosts,
            rolling: self.rolling.stats(),
        }
    }

    /// Most recent lifecycle events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<TriageEvent> {
        self.events.snapshot_last_n(n)
    }

    fn update_open_gauge(&self) {
        gauge!("triage_open_alerts").set(self.open_alerts() as f64);
    }

    fn snapshot_of(&self, alert: &Alert, rank: Option<usize>) -> AlertSnapshot {
        let ctx = &alert.context;
        let mitre = (!ctx.alert_type.trim().is_empty()).then(|| mitre::annotate(&ctx.alert_type));
        AlertSnapshot {
            alert_id: alert.record.alert_id.clone(),
            score: alert.score.value,
            risk_level: RiskLevel::from_score(alert.score.value, &self.thresholds),
            status: alert.status,
            model_version: alert.score.model_version.clone(),
            mitre,
            context: alert.context.clone(),
            scored_at: alert.scored_at,
            rank,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explain::ADDITIVITY_EPSILON;
    use crate::history::TriageEventKind;
    use crate::model::LinearModel;
    use std::collections::BTreeMap;

    fn test_model() -> TriageModel {
        let mut weights = BTreeMap::new();
        weights.insert("login_failures".to_string(), 0.5);
        weights.insert("bytes_exfiltrated".to_string(), 0.5);
        TriageModel::linear(LinearModel::new("test-1", 0.0, weights))
    }

    fn registry() -> AlertRegistry {
        AlertRegistry::new(test_model(), &EngineConfig::default())
    }

    fn record(id: &str, login_failures: f64, bytes_exfiltrated: f64) -> FeatureRecord {
        FeatureRecord::new(id)
            .with_feature("login_failures", login_failures)
            .with_feature("bytes_exfiltrated", bytes_exfiltrated)
    }

    #[test]
    fn ingest_scores_and_ranks() {
        let reg = registry();
        let snap = reg
            .ingest(record("A-1", 1.0, 0.6), AlertContext::default())
            .unwrap();
        assert!((snap.score - 0.8).abs() < 1e-9);
        assert_eq!(snap.status, AlertStatus::Scored);
        assert_eq!(snap.rank, Some(1));
        assert_eq!(reg.open_alerts(), 1);
    }

    #[test]
    fn duplicate_open_id_is_rejected() {
        let reg = registry();
        reg.ingest(record("A-1", 0.2, 0.2), AlertContext::default())
            .unwrap();
        let err = reg
            .ingest(record("A-1", 0.2, 0.2), AlertContext::default())
            .unwrap_err();
        assert_eq!(err.kind(), "duplicate_alert");
        assert_eq!(reg.open_alerts(), 1);
    }

    #[test]
    fn closed_id_can_be_reused() {
        let reg = registry();
        reg.ingest(record("A-1", 0.2, 0.2), AlertContext::default())
            .unwrap();
        reg.close("A-1").unwrap();
        let snap = reg
            .ingest(record("A-1", 1.0, 1.0), AlertContext::default())
            .unwrap();
        assert_eq!(snap.status, AlertStatus::Scored);
        assert_eq!(reg.open_alerts(), 1);
    }

    #[test]
    fn mismatched_record_leaves_no_trace() {
        let reg = registry();
        let bad = FeatureRecord::new("A-1").with_feature("login_failures", 1.0);
        let err = reg.ingest(bad, AlertContext::default()).unwrap_err();
        assert_eq!(err.kind(), "feature_mismatch");
        assert!(reg.get("A-1").is_err());
        assert_eq!(reg.open_alerts(), 0);
    }

    #[test]
    fn closed_is_terminal_for_every_operation() {
        let reg = registry();
        reg.ingest(record("A-1", 0.2, 0.2), AlertContext::default())
            .unwrap();
        reg.close("A-1").unwrap();
        assert_eq!(reg.close("A-1").unwrap_err().kind(), "closed_alert");
        assert_eq!(reg.rescore("A-1").unwrap_err().kind(), "closed_alert");
        assert_eq!(reg.get_explanation("A-1").unwrap_err().kind(), "closed_alert");
        assert!(reg.top_priority(10).is_empty());
        // the record itself stays readable
        let snap = reg.get("A-1").unwrap();
        assert_eq!(snap.status, AlertStatus::Closed);
        assert_eq!(snap.rank, None);
    }

    #[test]
    fn explanation_moves_scored_to_under_review_and_caches() {
        let reg = registry();
        reg.ingest(record("A-1", 0.4, 0.4), AlertContext::default())
            .unwrap();
        let first = reg.get_explanation("A-1").unwrap();
        assert_eq!(reg.get("A-1").unwrap().status, AlertStatus::UnderReview);
        let second = reg.get_explanation("A-1").unwrap();
        assert_eq!(first, second);
        let total = second.baseline
            + second
                .contributions
                .iter()
                .map(|c| c.contribution)
                .sum::<f64>();
        assert!((total - second.score).abs() <= ADDITIVITY_EPSILON);
    }

    #[test]
    fn rescore_invalidates_the_cached_attribution() {
        let reg = registry();
        reg.ingest(record("A-1", 1.0, 0.2), AlertContext::default())
            .unwrap();
        reg.get_explanation("A-1").unwrap();
        let handle = reg.lookup("A-1").unwrap();
        assert!(handle.read().cached_attribution.is_some());
        reg.rescore("A-1").unwrap();
        assert!(handle.read().cached_attribution.is_none());
    }

    #[test]
    fn queue_orders_by_score_desc_then_id_asc() {
        let reg = registry();
        reg.ingest(record("A", 1.0, 0.8), AlertContext::default())
            .unwrap(); // 0.9
        reg.ingest(record("C", 0.4, 0.4), AlertContext::default())
            .unwrap(); // 0.4
        reg.ingest(record("B", 0.8, 1.0), AlertContext::default())
            .unwrap(); // 0.9, ties with A, id breaks the tie
        let top = reg.top_priority(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].alert_id, "A");
        assert_eq!(top[1].alert_id, "B");
        assert_eq!(top[0].rank, Some(1));
        assert_eq!(reg.rank_of("C").unwrap(), 3);
    }

    #[test]
    fn level_filter_searches_the_whole_queue() {
        let reg = registry();
        reg.ingest(record("A", 1.0, 0.9), AlertContext::default())
            .unwrap(); // 0.95 high
        reg.ingest(record("B", 0.6, 0.5), AlertContext::default())
            .unwrap(); // 0.55 medium
        reg.ingest(record("C", 0.1, 0.1), AlertContext::default())
            .unwrap(); // 0.1 low
        let lows = reg.top_priority_by_level(10, RiskLevel::Low);
        assert_eq!(lows.len(), 1);
        assert_eq!(lows[0].alert_id, "C");
        assert_eq!(lows[0].rank, Some(3)); // rank stays global
    }

    #[test]
    fn stats_counts_levels_and_hosts() {
        let reg = registry();
        let ctx = |host: &str| AlertContext {
            alert_type: "PRIV_ESC".to_string(),
            user: "svc-backup".to_string(),
            destination_host: host.to_string(),
        };
        reg.ingest(record("A", 1.0, 0.8), ctx("db-1")).unwrap(); // 0.9
        reg.ingest(record("B", 0.5, 0.5), ctx("db-1")).unwrap(); // 0.5
        reg.ingest(record("C", 0.1, 0.1), ctx("web-1")).unwrap(); // 0.1
        let stats = reg.stats();
        assert_eq!(stats.open_alerts, 3);
        assert_eq!(stats.by_level.high, 1);
        assert_eq!(stats.by_level.medium, 1);
        assert_eq!(stats.by_level.low, 1);
        assert_eq!(stats.top_hosts[0].host, "db-1");
        assert_eq!(stats.top_hosts[0].count, 2);
        assert_eq!(stats.rolling.count, 3);
    }

    #[test]
    fn install_refuses_a_different_schema() {
        let reg = registry();
        let mut weights = BTreeMap::new();
        weights.insert("something_else".to_string(), 1.0);
        let err = reg
            .install_model(TriageModel::linear(LinearModel::new("v2", 0.0, weights)))
            .unwrap_err();
        assert_eq!(err.kind(), "model_internal");
        assert_eq!(reg.model_version(), "test-1");
    }

    #[test]
    fn install_sweep_rescores_open_alerts() {
        let reg = registry();
        reg.ingest(record("A", 1.0, 0.8), AlertContext::default())
            .unwrap(); // 0.9 under test-1
        reg.ingest(record("B", 0.2, 0.2), AlertContext::default())
            .unwrap();
        reg.close("B").unwrap();

        let mut weights = BTreeMap::new();
        weights.insert("login_failures".to_string(), 0.1);
        weights.insert("bytes_exfiltrated".to_string(), 0.25);
        let report = reg
            .install_model(TriageModel::linear(LinearModel::new("v2", 0.0, weights)))
            .unwrap();
        assert_eq!(report.version, "v2");
        assert_eq!(report.rescored, 1); // closed B is skipped

        let snap = reg.get("A").unwrap();
        assert_eq!(snap.model_version, "v2");
        assert!((snap.score - 0.3).abs() < 1e-9);
        let att = reg.get_explanation("A").unwrap();
        assert_eq!(att.model_version, "v2");
    }

    #[test]
    fn explanation_resolves_stale_scores_itself() {
        let handle = ModelHandle::new(test_model());
        let reg = AlertRegistry::with_handle(handle.clone(), &EngineConfig::default());
        reg.ingest(record("A", 1.0, 0.8), AlertContext::default())
            .unwrap(); // 0.9

        // raw swap, deliberately without the install sweep
        let mut weights = BTreeMap::new();
        weights.insert("login_failures".to_string(), 0.1);
        weights.insert("bytes_exfiltrated".to_string(), 0.25);
        handle.replace(TriageModel::linear(LinearModel::new("v2", 0.0, weights)));

        let att = reg.get_explanation("A").unwrap();
        assert_eq!(att.model_version, "v2");
        assert!((att.score - 0.3).abs() < 1e-9);
        assert!((reg.get("A").unwrap().score - 0.3).abs() < 1e-9);
        assert!((reg.top_priority(1)[0].score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn events_trace_the_lifecycle() {
        let reg = registry();
        reg.ingest(record("A", 0.5, 0.5), AlertContext::default())
            .unwrap();
        reg.get_explanation("A").unwrap();
        reg.close("A").unwrap();
        let events = reg.recent_events(10);
        assert_eq!(events[0].kind, TriageEventKind::Closed);
        assert_eq!(events[1].kind, TriageEventKind::Explained);
        assert_eq!(events[2].kind, TriageEventKind::Ingested);
    }
}
