//! MCP Tool Execution Context
//!
//! Provides access to the backend session for tool implementations.

use std::sync::Arc;

use crate::adt::{AdtClient, LockRetryPolicy};

/// Context provided to tool handlers during execution
#[derive(Clone)]
pub struct ToolContext {
    /// The shared backend session
    pub client: Arc<AdtClient>,

    /// Retry policy for writes that hit a foreign lock
    pub lock_policy: LockRetryPolicy,
}

impl ToolContext {
    pub fn new(client: Arc<AdtClient>, lock_policy: LockRetryPolicy) -> Self {
        Self {
            client,
            lock_policy,
        }
    }
}
