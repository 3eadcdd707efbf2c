// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod alert;
pub mod api;
pub mod config;
pub mod error;
pub mod explain;
pub mod history;
pub mod metrics;
pub mod mitre;
pub mod model;
pub mod ranker;
pub mod registry;
pub mod rolling;
pub mod scoring;

// ---- Re-exports for stable public API ----
pub use crate::alert::{
    Alert, AlertContext, AlertSnapshot, AlertStatus, Attribution, FeatureContribution,
    FeatureRecord, RiskLevel, RiskScore, RiskThresholds,
};
pub use crate::api::{create_router, AppState};
pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, ModelFailure};
pub use crate::explain::{AttributionModel, Explainer, ADDITIVITY_EPSILON};
pub use crate::model::{LinearModel, ModelHandle, TriageModel};
pub use crate::ranker::PriorityRanker;
pub use crate::registry::{AlertRegistry, ModelInstallReport, TriageStats};
pub use crate::scoring::{FeatureSchema, ScoringAdapter, ScoringModel};
