//! MCP (Model Context Protocol) Server
//!
//! Exposes the ADT session as a set of named tools an LLM client can call.
//!
//! ## Architecture
//!
//! - Transport: JSON-RPC over HTTP POST at `/mcp`, SSE heartbeat on GET
//! - Sessions: `Mcp-Session-Id` minted on `initialize`, dropped on DELETE
//! - Tools: registered once at startup, listed in registration order

pub mod context;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod sessions;
pub mod tools;

pub use handler::{create_mcp_state, handle_message, McpState};
pub use protocol::{McpError, McpRequest, McpResponse};
pub use registry::McpRegistry;
