//! MCP Protocol Types
//!
//! Implements the Model Context Protocol message types.
//! MCP is essentially JSON-RPC 2.0 with specific method names and schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::adt::AdtError;

/// JSON-RPC version string
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol version we support
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Header carrying the RPC session id (`Mcp-Session-Id`), in canonical lowercase
pub const MCP_SESSION_HEADER: &str = "mcp-session-id";

// ============================================================================
// Core Message Types
// ============================================================================

/// Incoming request from MCP client. Requests without `id` are notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct McpRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Response to MCP client
#[derive(Debug, Clone, Serialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpErrorResponse>,
}

impl McpResponse {
    pub fn success(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<RequestId>, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Request ID can be string or number, echoed back verbatim
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(serde_json::Number),
}

/// Error response structure
#[derive(Debug, Clone, Serialize)]
pub struct McpErrorResponse {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ============================================================================
// Error Codes (JSON-RPC + MCP specific)
// ============================================================================

/// Failures reported to the caller as JSON-RPC errors.
#[derive(Debug, Clone, Error)]
pub enum McpError {
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Unknown method: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Backend or tool failure, message passed through unchanged.
    #[error("{0}")]
    ToolExecutionFailed(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl McpError {
    pub fn code(&self) -> i32 {
        match self {
            McpError::ParseError(_) => -32700,
            McpError::InvalidRequest(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::InvalidParams(_) => -32602,
            McpError::InternalError(_) => -32603,
            McpError::ToolExecutionFailed(_) => -32000,
            McpError::UnknownTool(_) => -32001,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<McpError> for McpErrorResponse {
    fn from(err: McpError) -> Self {
        McpErrorResponse {
            code: err.code(),
            message: err.message(),
            data: None,
        }
    }
}

impl From<AdtError> for McpError {
    fn from(err: AdtError) -> Self {
        McpError::ToolExecutionFailed(err.to_string())
    }
}

// ============================================================================
// MCP Method Names
// ============================================================================

pub mod methods {
    // Lifecycle
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";

    // Tools
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";

    // Ping
    pub const PING: &str = "ping";
}

// ============================================================================
// Initialize Messages
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "sap-adt-mcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// ============================================================================
// Tools Messages
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCallResult {
    pub content: Vec<ToolResultContent>,
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolResultContent {
    Text { text: String },
}

impl ToolsCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolResultContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        let text = serde_json::to_string_pretty(value)?;
        Ok(Self::text(text))
    }

    /// Serializes `value`, mapping failures to an internal error.
    pub fn json_or_internal<T: Serialize>(value: &T) -> Result<Self, McpError> {
        Self::json(value).map_err(|e| McpError::InternalError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_deserialize_string() {
        let json = r#""test-id""#;
        let id: RequestId = serde_json::from_str(json).unwrap();
        assert_eq!(id, RequestId::String("test-id".to_string()));
    }

    #[test]
    fn test_request_id_deserialize_number() {
        let json = "42";
        let id: RequestId = serde_json::from_str(json).unwrap();
        assert_eq!(id, RequestId::Number(42.into()));
    }

    #[test]
    fn test_request_id_echoed_verbatim() {
        let id: RequestId = serde_json::from_str("1.5").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "1.5");
    }

    #[test]
    fn test_request_without_id_is_notification() {
        let req: McpRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(req.id.is_none());
    }

    #[test]
    fn test_mcp_response_success() {
        let resp = McpResponse::success(
            Some(RequestId::Number(1.into())),
            serde_json::json!({"ok": true}),
        );
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_mcp_response_error() {
        let resp = McpResponse::error(
            Some(RequestId::Number(1.into())),
            McpError::MethodNotFound("test".to_string()),
        );
        assert!(resp.result.is_none());
        assert!(resp.error.is_some());
        assert_eq!(resp.error.as_ref().unwrap().code, -32601);
    }

    #[test]
    fn test_response_without_id_omits_field() {
        let resp = McpResponse::success(None, serde_json::json!({}));
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(McpError::ParseError("".to_string()).code(), -32700);
        assert_eq!(McpError::InvalidRequest("".to_string()).code(), -32600);
        assert_eq!(McpError::MethodNotFound("".to_string()).code(), -32601);
        assert_eq!(McpError::InvalidParams("".to_string()).code(), -32602);
        assert_eq!(McpError::InternalError("".to_string()).code(), -32603);
        assert_eq!(McpError::ToolExecutionFailed("".to_string()).code(), -32000);
        assert_eq!(McpError::UnknownTool("".to_string()).code(), -32001);
    }

    #[test]
    fn test_adt_error_becomes_tool_failure() {
        let err: McpError = AdtError::Protocol("no token".to_string()).into();
        assert_eq!(err.code(), -32000);
        assert_eq!(err.message(), "Protocol error: no token");
    }

    #[test]
    fn test_tools_call_result_text() {
        let result = ToolsCallResult::text("Hello, world!");
        assert_eq!(result.content.len(), 1);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "content": [{"type": "text", "text": "Hello, world!"}],
                "isError": false
            })
        );
    }
}
