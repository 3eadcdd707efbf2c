use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and register the engine's series.
    pub fn init(queue_default_limit: usize) -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_counter!(
            "triage_alerts_ingested_total",
            "Alerts accepted and scored at ingest"
        );
        describe_counter!("triage_rescores_total", "Explicit and sweep re-scores");
        describe_counter!(
            "triage_explanations_total",
            "Attributions served (computed or cached)"
        );
        describe_counter!(
            "triage_explanation_cache_hits_total",
            "Attributions served from the per-alert cache"
        );
        describe_counter!("triage_alerts_closed_total", "Alerts moved to closed");
        describe_counter!(
            "triage_model_installs_total",
            "Model versions installed at runtime"
        );
        describe_gauge!("triage_open_alerts", "Alerts currently in the queue");

        // Static gauge with the configured queue page size
        gauge!("triage_queue_default_limit").set(queue_default_limit as f64);

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
