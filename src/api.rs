use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::alert::{
    AlertContext, AlertSnapshot, AlertStatus, FeatureContribution, FeatureRecord, RiskLevel,
};
use crate::config::{EngineConfig, QueueConfig};
use crate::error::EngineError;
use crate::history::TriageEvent;
use crate::mitre::MitreAnnotation;
use crate::model::{LinearModel, TriageModel};
use crate::registry::{AlertRegistry, ModelInstallReport, TriageStats};

/// How many summary lines an explanation response carries.
const SUMMARY_TOP_N: usize = 3;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AlertRegistry>,
    queue: QueueConfig,
    model_path: String,
}

impl AppState {
    pub fn new(registry: Arc<AlertRegistry>, config: &EngineConfig) -> Self {
        Self {
            registry,
            queue: config.queue,
            model_path: config.model.path.clone(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/alerts", post(ingest_alert))
        .route("/alerts/batch", post(ingest_batch))
        .route("/alerts/{id}", get(alert_detail))
        .route("/alerts/{id}/explanation", get(explanation))
        .route("/alerts/{id}/rescore", post(rescore_alert))
        .route("/alerts/{id}/close", post(close_alert))
        .route("/queue", get(queue))
        .route("/stats", get(stats))
        .route("/debug/events", get(debug_events))
        .route("/admin/reload-model", post(admin_reload_model))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::FeatureMismatch { .. } | EngineError::InvalidFeatureValue { .. } => {
                StatusCode::BAD_REQUEST
            }
            EngineError::DuplicateAlert { .. } | EngineError::ClosedAlert { .. } => {
                StatusCode::CONFLICT
            }
            EngineError::UnknownAlert { .. } => StatusCode::NOT_FOUND,
            EngineError::StaleScore { .. } | EngineError::Model(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
    status: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(kind = self.kind, error = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: self.message,
            kind: self.kind,
            status: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Run scoring work on the blocking pool so model evaluation never stalls
/// the async executor.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EngineError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(err) => {
            warn!(%err, "blocking task failed to run");
            Err(ApiError::internal("internal task failure"))
        }
    }
}

#[derive(serde::Deserialize)]
struct IngestReq {
    alert_id: String,
    features: BTreeMap<String, f64>,
    #[serde(default)]
    alert_type: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    destination_host: String,
}

impl IngestReq {
    fn into_parts(self) -> (FeatureRecord, AlertContext) {
        (
            FeatureRecord {
                alert_id: self.alert_id,
                features: self.features,
            },
            AlertContext {
                alert_type: self.alert_type,
                user: self.user,
                destination_host: self.destination_host,
            },
        )
    }
}

#[derive(serde::Serialize)]
struct IngestResp {
    alert_id: String,
    score: f64,
    risk_level: RiskLevel,
}

impl From<AlertSnapshot> for IngestResp {
    fn from(snap: AlertSnapshot) -> Self {
        Self {
            alert_id: snap.alert_id,
            score: snap.score,
            risk_level: snap.risk_level,
        }
    }
}

async fn ingest_alert(
    State(state): State<AppState>,
    Json(body): Json<IngestReq>,
) -> Result<(StatusCode, Json<IngestResp>), ApiError> {
    let registry = state.registry.clone();
    let snapshot = run_blocking(move || {
        let (record, context) = body.into_parts();
        registry.ingest(record, context)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(IngestResp::from(snapshot))))
}

#[derive(serde::Serialize)]
struct BatchItemResp {
    alert_id: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Batch ingest is per-item: one rejected record does not fail the rest.
async fn ingest_batch(
    State(state): State<AppState>,
    Json(items): Json<Vec<IngestReq>>,
) -> Result<Json<Vec<BatchItemResp>>, ApiError> {
    let registry = state.registry.clone();
    let results = run_blocking(move || {
        let out = items
            .into_iter()
            .map(|item| {
                let alert_id = item.alert_id.clone();
                let (record, context) = item.into_parts();
                match registry.ingest(record, context) {
                    Ok(snap) => BatchItemResp {
                        alert_id,
                        ok: true,
                        score: Some(snap.score),
                        risk_level: Some(snap.risk_level),
                        error: None,
                    },
                    Err(err) => BatchItemResp {
                        alert_id,
                        ok: false,
                        score: None,
                        risk_level: None,
                        error: Some(err.to_string()),
                    },
                }
            })
            .collect();
        Ok(out)
    })
    .await?;
    Ok(Json(results))
}

async fn alert_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AlertSnapshot>, ApiError> {
    Ok(Json(state.registry.get(&id)?))
}

#[derive(serde::Deserialize)]
struct QueueParams {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    level: Option<String>,
}

async fn queue(
    State(state): State<AppState>,
    Query(params): Query<QueueParams>,
) -> Result<Json<Vec<AlertSnapshot>>, ApiError> {
    let limit = effective_limit(params.limit, &state.queue);
    let level = parse_level_filter(params.level.as_deref())?;
    let snapshots = match level {
        Some(level) => state.registry.top_priority_by_level(limit, level),
        None => state.registry.top_priority(limit),
    };
    Ok(Json(snapshots))
}

fn effective_limit(requested: Option<usize>, queue: &QueueConfig) -> usize {
    match requested {
        None | Some(0) => queue.default_limit,
        Some(n) => n.min(queue.max_limit),
    }
}

fn parse_level_filter(raw: Option<&str>) -> Result<Option<RiskLevel>, ApiError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("all") => Ok(None),
        Some("high") => Ok(Some(RiskLevel::High)),
        Some("medium") => Ok(Some(RiskLevel::Medium)),
        Some("low") => Ok(Some(RiskLevel::Low)),
        Some(other) => Err(ApiError::bad_request(format!(
            "unknown risk level `{other}` (expected high, medium, low, or all)"
        ))),
    }
}

#[derive(serde::Serialize)]
struct ExplanationResp {
    alert_id: String,
    model_version: String,
    score: f64,
    baseline: f64,
    contributions: Vec<FeatureContribution>,
    summary: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mitre: Option<MitreAnnotation>,
}

async fn explanation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExplanationResp>, ApiError> {
    let registry = state.registry.clone();
    let lookup_id = id.clone();
    let attribution = run_blocking(move || registry.get_explanation(&lookup_id)).await?;
    let mitre = state.registry.get(&id).ok().and_then(|snap| snap.mitre);
    let summary = attribution.summary(SUMMARY_TOP_N);
    Ok(Json(ExplanationResp {
        alert_id: attribution.alert_id,
        model_version: attribution.model_version,
        score: attribution.score,
        baseline: attribution.baseline,
        contributions: attribution.contributions,
        summary,
        mitre,
    }))
}

async fn rescore_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AlertSnapshot>, ApiError> {
    let registry = state.registry.clone();
    let snapshot = run_blocking(move || registry.rescore(&id)).await?;
    Ok(Json(snapshot))
}

#[derive(serde::Serialize)]
struct CloseResp {
    alert_id: String,
    status: AlertStatus,
}

async fn close_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CloseResp>, ApiError> {
    let snapshot = state.registry.close(&id)?;
    Ok(Json(CloseResp {
        alert_id: snapshot.alert_id,
        status: snapshot.status,
    }))
}

async fn stats(State(state): State<AppState>) -> Json<TriageStats> {
    Json(state.registry.stats())
}

#[derive(serde::Deserialize)]
struct EventParams {
    #[serde(default)]
    limit: Option<usize>,
}

async fn debug_events(
    State(state): State<AppState>,
    Query(params): Query<EventParams>,
) -> Json<Vec<TriageEvent>> {
    let limit = match params.limit {
        None | Some(0) => 50,
        Some(n) => n,
    };
    Json(state.registry.recent_events(limit))
}

/// Reload the model file from disk and install it, re-scoring the open
/// alert set under the new version.
async fn admin_reload_model(
    State(state): State<AppState>,
) -> Result<Json<ModelInstallReport>, ApiError> {
    let registry = state.registry.clone();
    let path = state.model_path.clone();
    let report = run_blocking(move || {
        let model = LinearModel::load_from_file(&path);
        registry.install_model(TriageModel::linear(model))
    })
    .await?;
    Ok(Json(report))
}
