//! # Engine Configuration
//! TOML file plus environment overrides. Everything has a sensible
//! default, so the engine runs with no config file at all.
//!
//! Precedence: defaults < `config/triage.toml` (or `TRIAGE_CONFIG_PATH`)
//! < `TRIAGE_BIND_ADDR` / `TRIAGE_MODEL_PATH`.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::info;

use crate::alert::RiskThresholds;

pub const DEFAULT_CONFIG_PATH: &str = "config/triage.toml";
pub const ENV_CONFIG_PATH: &str = "TRIAGE_CONFIG_PATH";
pub const ENV_BIND_ADDR: &str = "TRIAGE_BIND_ADDR";
pub const ENV_MODEL_PATH: &str = "TRIAGE_MODEL_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "config/model.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Page size when the queue request names no limit.
    pub default_limit: usize,
    /// Hard cap per request.
    pub max_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Event log capacity; oldest entries are evicted beyond this.
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 2000 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub thresholds: RiskThresholds,
    pub queue: QueueConfig,
    pub history: HistoryConfig,
}

impl EngineConfig {
    /// Load from the configured path, then apply env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_CONFIG_PATH)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from(Path::new(&path))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse one TOML file; a missing file means defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!("config file {} not found; using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        info!("config loaded from {}", path.display());
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var(ENV_BIND_ADDR) {
            if !addr.trim().is_empty() {
                self.server.bind_addr = addr;
            }
        }
        if let Ok(path) = std::env::var(ENV_MODEL_PATH) {
            if !path.trim().is_empty() {
                self.model.path = path;
            }
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let t = &self.thresholds;
        if !(t.medium > 0.0 && t.medium < t.high && t.high <= 1.0) {
            bail!(
                "risk thresholds must satisfy 0 < medium < high <= 1 (got medium={}, high={})",
                t.medium,
                t.high
            );
        }
        if self.queue.default_limit == 0 || self.queue.default_limit > self.queue.max_limit {
            bail!(
                "queue default_limit must be in 1..=max_limit (got default={}, max={})",
                self.queue.default_limit,
                self.queue.max_limit
            );
        }
        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid bind_addr `{}`", self.server.bind_addr))?;
        Ok(())
    }
}
