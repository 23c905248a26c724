//! Configuration loading.
//!
//! Settings come from a TOML file with environment overrides on top, so a
//! deployment can keep the endpoint in the file and the API key in the
//! environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding tenant databases and workspaces.
    pub data_dir: PathBuf,
    pub gateway: GatewayConfig,
    pub worker: WorkerConfig,
    pub diffusion: DiffusionConfig,
}

/// Gateway endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// API key; usually supplied via `CONCIERGE_API_KEY`.
    pub api_key: String,
    /// Base URL of an OpenAI-compatible endpoint.
    pub base_url: String,
    /// Default model identifier.
    pub model: String,
}

/// Tenant worker settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Maximum jobs handled per cycle.
    pub batch_limit: i64,
}

/// Diffusion endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    /// URL of the image generation endpoint.
    pub endpoint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            gateway: GatewayConfig::default(),
            worker: WorkerConfig::default(),
            diffusion: DiffusionConfig::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            batch_limit: 10,
        }
    }
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:7860/generate".into(),
        }
    }
}

impl Config {
    /// Load from `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read config file {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlay `CONCIERGE_*` environment variables.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("CONCIERGE_API_KEY") {
            self.gateway.api_key = key;
        }
        if let Ok(url) = std::env::var("CONCIERGE_BASE_URL") {
            self.gateway.base_url = url;
        }
        if let Ok(model) = std::env::var("CONCIERGE_MODEL") {
            self.gateway.model = model;
        }
        if let Ok(dir) = std::env::var("CONCIERGE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(endpoint) = std::env::var("CONCIERGE_DIFFUSION_ENDPOINT") {
            self.diffusion.endpoint = endpoint;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
