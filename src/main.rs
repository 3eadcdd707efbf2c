//! Alert Triage Engine — Binary Entrypoint
//! Boots the Axum HTTP server, wiring config, the risk model, shared
//! state, and the Prometheus exporter.
//!
//! See `README.md` for quickstart.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use alert_triage_engine::api::{create_router, AppState};
use alert_triage_engine::config::EngineConfig;
use alert_triage_engine::metrics::Metrics;
use alert_triage_engine::model::{LinearModel, TriageModel};
use alert_triage_engine::registry::AlertRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("alert_triage_engine=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = EngineConfig::load().context("loading engine config")?;

    let model = TriageModel::linear(LinearModel::load_from_file(&config.model.path));
    let registry = Arc::new(AlertRegistry::new(model, &config));

    let metrics = Metrics::init(config.queue.default_limit);

    let state = AppState::new(registry.clone(), &config);
    let app = create_router(state).merge(metrics.router());

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    info!(
        addr = %config.server.bind_addr,
        model = %registry.model_version(),
        "alert triage engine listening"
    );
    axum::serve(listener, app).await.context("serving http")?;
    Ok(())
}
