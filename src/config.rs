//! TOML configuration.
//!
//! ```toml
//! [cluster]
//! url = "http://localhost:8080"
//! api_key_env = "WEAVIATE_API_KEY"
//! timeout_secs = 30
//!
//! [repair]
//! page_size = 1000
//! batch_size = 100
//! consistency = "ALL"
//! pause_ms = 0
//!
//! [server]
//! bind = "127.0.0.1:8765"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Only `[cluster].url` is required.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::models::ConsistencyLevel;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub repair: RepairConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    pub url: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ClusterConfig {
    /// Resolve the API key from the configured environment variable.
    ///
    /// Returns `Ok(None)` when no variable is configured, and an error when
    /// one is configured but unset.
    pub fn api_key(&self) -> Result<Option<String>> {
        match &self.api_key_env {
            None => Ok(None),
            Some(var) => std::env::var(var)
                .map(Some)
                .with_context(|| format!("{} environment variable not set", var)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepairConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub consistency: ConsistencyLevel,
    /// Pause between batches when the CLI drives a repair.
    #[serde(default)]
    pub pause_ms: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            batch_size: default_batch_size(),
            consistency: ConsistencyLevel::All,
            pause_ms: 0,
        }
    }
}

fn default_page_size() -> usize {
    1000
}
fn default_batch_size() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8765".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let url = config.cluster.url.trim();
    if url.is_empty() {
        anyhow::bail!("cluster.url must not be empty");
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("cluster.url must start with http:// or https://, got '{}'", url);
    }

    if config.repair.page_size == 0 {
        anyhow::bail!("repair.page_size must be > 0");
    }
    if config.repair.batch_size == 0 {
        anyhow::bail!("repair.batch_size must be > 0");
    }

    Ok(())
}
