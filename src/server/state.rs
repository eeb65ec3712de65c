use std::sync::Arc;

use axum::extract::FromRef;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::mcp::McpState;

use super::ServerConfig;

pub type GuardedMcpState = Arc<McpState>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub started_at: DateTime<Utc>,
    pub mcp_state: GuardedMcpState,
    /// Cancelled on shutdown; ends open event streams.
    pub shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(config: ServerConfig, mcp_state: GuardedMcpState, shutdown: CancellationToken) -> Self {
        Self {
            config,
            started_at: Utc::now(),
            mcp_state,
            shutdown,
        }
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedMcpState {
    fn from_ref(input: &ServerState) -> Self {
        input.mcp_state.clone()
    }
}
