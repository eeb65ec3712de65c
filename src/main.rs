use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use adt_mcp_server::adt::AdtClient;
use adt_mcp_server::config;
use adt_mcp_server::mcp::create_mcp_state;
use adt_mcp_server::server::{run_server, RequestsLoggingLevel};

#[derive(Parser, Debug)]
#[clap(version, about = "MCP server exposing ABAP development tools over HTTP")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Base URL of the ABAP system, e.g. https://sap.example.com:44300
    #[clap(long)]
    pub url: Option<String>,

    #[clap(long)]
    pub user: Option<String>,

    #[clap(long, env = "ADT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SAP client (mandant).
    #[clap(long, default_value = "100")]
    pub client: String,

    #[clap(long, default_value = "EN")]
    pub language: String,

    /// Accept invalid TLS certificates from the backend.
    #[clap(long)]
    pub allow_insecure_tls: bool,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3000)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Seconds between keep-alive comments on the event stream.
    #[clap(long, default_value_t = 15)]
    pub heartbeat_interval_secs: u64,

    #[clap(long, default_value_t = 60)]
    pub request_timeout_sec: u64,

    #[clap(long, default_value_t = 30)]
    pub connect_timeout_sec: u64,

    /// How many times a lock is attempted when the object is held elsewhere.
    #[clap(long, default_value_t = 3)]
    pub lock_max_attempts: u32,

    #[clap(long, default_value_t = 500)]
    pub lock_backoff_ms: u64,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            port: args.port,
            logging_level: args.logging_level.clone(),
            heartbeat_interval_secs: args.heartbeat_interval_secs,
            backend_url: args.url.clone(),
            user: args.user.clone(),
            password: args.password.clone(),
            client: args.client.clone(),
            language: args.language.clone(),
            allow_insecure_tls: args.allow_insecure_tls,
            request_timeout_sec: args.request_timeout_sec,
            connect_timeout_sec: args.connect_timeout_sec,
            lock_max_attempts: args.lock_max_attempts,
            lock_backoff_ms: args.lock_backoff_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config = config::CliConfig::from(&cli_args);
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    if app_config.backend.allow_insecure_tls {
        warn!("TLS certificate verification is disabled for the backend");
    }

    let client = Arc::new(
        AdtClient::new(app_config.adt_client_config())
            .context("Failed to create ADT client")?,
    );
    client
        .login()
        .await
        .with_context(|| format!("Failed to log in to {}", app_config.backend.url))?;

    let mcp_state = Arc::new(create_mcp_state(
        client.clone(),
        app_config.lock_retry_policy(),
    ));

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating graceful shutdown");
                signal_token.cancel();
            }
            Err(err) => error!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    info!("Ready to serve at port {}!", app_config.port);
    let result = run_server(app_config.server_config(), mcp_state, shutdown_token).await;

    if let Err(err) = client.logout().await {
        warn!("Logout failed: {}", err);
    }

    result
}
