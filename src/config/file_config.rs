use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub heartbeat_interval_secs: Option<u64>,

    // Sections
    pub backend: Option<BackendConfig>,
    pub lock: Option<LockConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub client: Option<String>,
    pub language: Option<String>,
    pub allow_insecure_tls: Option<bool>,
    pub request_timeout_sec: Option<u64>,
    pub connect_timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LockConfig {
    pub max_attempts: Option<u32>,
    pub backoff_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
