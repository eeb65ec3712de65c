mod file_config;

pub use file_config::{BackendConfig, FileConfig, LockConfig};

use crate::adt::{AdtClientConfig, LockRetryPolicy};
use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub heartbeat_interval_secs: u64,
    pub backend_url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub client: String,
    pub language: String,
    pub allow_insecure_tls: bool,
    pub request_timeout_sec: u64,
    pub connect_timeout_sec: u64,
    pub lock_max_attempts: u32,
    pub lock_backoff_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            logging_level: RequestsLoggingLevel::default(),
            heartbeat_interval_secs: 15,
            backend_url: None,
            user: None,
            password: None,
            client: "100".to_string(),
            language: "EN".to_string(),
            allow_insecure_tls: false,
            request_timeout_sec: 60,
            connect_timeout_sec: 30,
            lock_max_attempts: 3,
            lock_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub heartbeat_interval_secs: u64,

    pub backend: BackendSettings,
    pub lock: LockSettings,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    pub client: String,
    pub language: String,
    pub allow_insecure_tls: bool,
    pub request_timeout_sec: u64,
    pub connect_timeout_sec: u64,
}

#[derive(Debug, Clone)]
pub struct LockSettings {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let heartbeat_interval_secs = file
            .heartbeat_interval_secs
            .unwrap_or(cli.heartbeat_interval_secs);
        if heartbeat_interval_secs == 0 {
            bail!("heartbeat_interval_secs must be greater than 0");
        }

        let backend_file = file.backend.unwrap_or_default();

        let url = backend_file
            .url
            .or_else(|| cli.backend_url.clone())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("backend url must be specified via --url or in config file")
            })?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("backend url must start with http:// or https://: {}", url);
        }

        let user = backend_file
            .user
            .or_else(|| cli.user.clone())
            .filter(|user| !user.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("backend user must be specified via --user or in config file")
            })?;

        let backend = BackendSettings {
            url,
            user,
            password: backend_file
                .password
                .or_else(|| cli.password.clone())
                .unwrap_or_default(),
            client: backend_file.client.unwrap_or_else(|| cli.client.clone()),
            language: backend_file
                .language
                .unwrap_or_else(|| cli.language.clone()),
            allow_insecure_tls: backend_file
                .allow_insecure_tls
                .unwrap_or(cli.allow_insecure_tls),
            request_timeout_sec: backend_file
                .request_timeout_sec
                .unwrap_or(cli.request_timeout_sec),
            connect_timeout_sec: backend_file
                .connect_timeout_sec
                .unwrap_or(cli.connect_timeout_sec),
        };

        let lock_file = file.lock.unwrap_or_default();
        let lock = LockSettings {
            max_attempts: lock_file
                .max_attempts
                .unwrap_or(cli.lock_max_attempts)
                .max(1),
            backoff_ms: lock_file.backoff_ms.unwrap_or(cli.lock_backoff_ms),
        };

        Ok(Self {
            port,
            logging_level,
            heartbeat_interval_secs,
            backend,
            lock,
        })
    }

    pub fn adt_client_config(&self) -> AdtClientConfig {
        AdtClientConfig {
            base_url: self.backend.url.clone(),
            user: self.backend.user.clone(),
            password: self.backend.password.clone(),
            client: self.backend.client.clone(),
            language: self.backend.language.clone(),
            allow_insecure_tls: self.backend.allow_insecure_tls,
            request_timeout: Duration::from_secs(self.backend.request_timeout_sec),
            connect_timeout: Duration::from_secs(self.backend.connect_timeout_sec),
        }
    }

    pub fn lock_retry_policy(&self) -> LockRetryPolicy {
        LockRetryPolicy {
            max_attempts: self.lock.max_attempts,
            backoff: Duration::from_millis(self.lock.backoff_ms),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            port: self.port,
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
        }
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
