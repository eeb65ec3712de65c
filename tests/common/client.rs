//! HTTP client for end-to-end tests
//!
//! Wraps reqwest and speaks JSON-RPC to the `/mcp` endpoint.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const SESSION_HEADER: &str = "mcp-session-id";

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
    next_id: AtomicU64,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            next_id: AtomicU64::new(1),
        }
    }

    fn mcp_url(&self) -> String {
        format!("{}/mcp", self.base_url)
    }

    // ========================================================================
    // Raw HTTP
    // ========================================================================

    /// POST /mcp with an arbitrary body
    pub async fn post_raw(&self, body: &str) -> Response {
        self.client
            .post(self.mcp_url())
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("MCP POST failed")
    }

    /// GET /mcp with the given Accept header
    pub async fn get_mcp(&self, accept: &str) -> Response {
        self.client
            .get(self.mcp_url())
            .header("accept", accept)
            .send()
            .await
            .expect("MCP GET failed")
    }

    /// DELETE /mcp
    pub async fn delete_session(&self, session_id: &str) -> Response {
        self.client
            .delete(self.mcp_url())
            .header(SESSION_HEADER, session_id)
            .send()
            .await
            .expect("MCP DELETE failed")
    }

    /// GET /health
    pub async fn health(&self) -> Response {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .expect("Health request failed")
    }

    // ========================================================================
    // JSON-RPC
    // ========================================================================

    /// Sends a JSON-RPC request and returns the raw HTTP response.
    pub async fn rpc_response(&self, method: &str, params: Option<Value>) -> Response {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut request = json!({"jsonrpc": "2.0", "id": id, "method": method});
        if let Some(params) = params {
            request["params"] = params;
        }
        self.post_raw(&request.to_string()).await
    }

    /// Sends a JSON-RPC request and returns the decoded envelope.
    ///
    /// # Panics
    ///
    /// Panics unless the HTTP status is 200.
    pub async fn rpc(&self, method: &str, params: Option<Value>) -> Value {
        let response = self.rpc_response(method, params).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.expect("Response is not JSON")
    }

    pub async fn initialize(&self) -> (Value, String) {
        let response = self
            .rpc_response(
                "initialize",
                Some(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "e2e", "version": "0"}
                })),
            )
            .await;
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .expect("initialize did not return a session id")
            .to_str()
            .expect("Session id is not ASCII")
            .to_string();
        let body = response.json().await.expect("Response is not JSON");
        (body, session_id)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Value {
        self.rpc(
            "tools/call",
            Some(json!({"name": name, "arguments": arguments})),
        )
        .await
    }

    /// Calls a tool and decodes the JSON carried in its first text block.
    ///
    /// # Panics
    ///
    /// Panics if the call returned a JSON-RPC error.
    pub async fn call_tool_json(&self, name: &str, arguments: Value) -> Value {
        let envelope = self.call_tool(name, arguments).await;
        assert!(
            envelope.get("error").is_none(),
            "{} failed: {}",
            name,
            envelope["error"]
        );
        let text = envelope["result"]["content"][0]["text"]
            .as_str()
            .expect("Tool result has no text content");
        serde_json::from_str(text).expect("Tool text is not JSON")
    }
}
