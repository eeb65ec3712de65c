//! MCP JSON-RPC dispatch
//!
//! Turns one request body into one response. The HTTP layer in
//! `server::server` owns transport concerns (headers, status codes, SSE).

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::context::ToolContext;
use super::protocol::{
    methods, InitializeResult, McpError, McpRequest, McpResponse, RequestId, ServerCapabilities,
    ServerInfo, ToolsCallParams, ToolsCapability, ToolsListResult, MCP_PROTOCOL_VERSION,
};
use super::registry::McpRegistry;
use super::sessions::SessionRegistry;
use crate::adt::{AdtClient, LockRetryPolicy};

/// State shared across MCP requests
pub struct McpState {
    pub registry: Arc<McpRegistry>,
    pub sessions: SessionRegistry,
    pub context: ToolContext,
}

/// Outcome of dispatching one message.
#[derive(Debug)]
pub struct Dispatched {
    pub response: McpResponse,
    /// Set when the message opened a new session.
    pub session_id: Option<String>,
}

impl Dispatched {
    fn reply(response: McpResponse) -> Self {
        Self {
            response,
            session_id: None,
        }
    }
}

/// Handle a single MCP message
pub async fn handle_message(mcp_state: &McpState, text: &str) -> Dispatched {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return Dispatched::reply(McpResponse::error(
                None,
                McpError::ParseError(e.to_string()),
            ));
        }
    };

    // Salvage the id so a malformed envelope still correlates.
    let raw_id: Option<RequestId> = value
        .get("id")
        .and_then(|id| serde_json::from_value(id.clone()).ok());

    let request: McpRequest = match serde_json::from_value(value) {
        Ok(req) => req,
        Err(e) => {
            return Dispatched::reply(McpResponse::error(
                raw_id,
                McpError::InvalidRequest(e.to_string()),
            ));
        }
    };

    let request_id = request.id.clone();
    debug!("MCP request: {}", request.method);

    let mut session_id = None;

    // Dispatch based on method
    let result = match request.method.as_str() {
        methods::INITIALIZE => {
            let id = mcp_state.sessions.create().await;
            info!("MCP session opened: {}", id);
            session_id = Some(id);
            handle_initialize()
        }
        methods::INITIALIZED | methods::PING => Ok(serde_json::json!({})),
        methods::TOOLS_LIST => handle_tools_list(mcp_state),
        methods::TOOLS_CALL => handle_tools_call(&request, mcp_state).await,
        other => Err(McpError::MethodNotFound(other.to_string())),
    };

    let response = match result {
        Ok(value) => McpResponse::success(request_id, value),
        Err(error) => {
            debug!("MCP {} failed: {}", request.method, error.message());
            McpResponse::error(request_id, error)
        }
    };

    Dispatched {
        response,
        session_id,
    }
}

fn handle_initialize() -> Result<Value, McpError> {
    let result = InitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapability {
                list_changed: false,
            },
        },
        server_info: ServerInfo::default(),
    };

    serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
}

fn handle_tools_list(mcp_state: &McpState) -> Result<Value, McpError> {
    let result = ToolsListResult {
        tools: mcp_state.registry.tool_definitions(),
    };

    serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
}

async fn handle_tools_call(request: &McpRequest, mcp_state: &McpState) -> Result<Value, McpError> {
    let params: ToolsCallParams = request
        .params
        .clone()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))?
        .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))?;

    let tool = mcp_state
        .registry
        .find_tool(&params.name)
        .ok_or_else(|| McpError::UnknownTool(params.name.clone()))?;

    debug!("Calling tool {}", tool.name);

    // Execute the tool
    let arguments = params.arguments.unwrap_or(serde_json::json!({}));
    let result = (tool.handler)(mcp_state.context.clone(), arguments).await?;

    serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
}

/// Create the MCP state with registered tools
pub fn create_mcp_state(client: Arc<AdtClient>, lock_policy: LockRetryPolicy) -> McpState {
    let mut registry = McpRegistry::new();

    // Register all tools
    super::tools::register_all_tools(&mut registry);

    info!("MCP registry initialized with {} tools", registry.tool_count());

    McpState {
        registry: Arc::new(registry),
        sessions: SessionRegistry::new(),
        context: ToolContext::new(client, lock_policy),
    }
}
