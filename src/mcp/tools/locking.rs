//! Locking Tools
//!
//! Manual lock, unlock and activation. `sap_set_source` runs the same
//! steps in one go; these exist for multi-step edits driven by the agent.

use serde::Deserialize;
use serde_json::{json, Value};

use super::args::{object_schema, required, ObjectArgs};
use crate::adt::lock::{self, LockHandle};
use crate::adt::AdtError;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

/// Register locking tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tools([lock_tool(), unlock_tool(), activate_tool()]);
}

#[derive(Debug, Deserialize)]
struct ObjectParams {
    #[serde(flatten)]
    object: ObjectArgs,
}

// ============================================================================
// sap_lock
// ============================================================================

fn lock_tool() -> RegisteredTool {
    ToolBuilder::new("sap_lock")
        .description("Lock an ABAP object for editing. Returns the lock handle.")
        .input_schema(object_schema(json!({}), &[]))
        .build(lock_handler)
}

async fn lock_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ObjectParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    let object_url = params.object.object_url()?;

    let lock_handle = match lock::lock(&ctx.client, &object_url).await {
        Ok(handle) => Some(handle.as_str().to_string()),
        Err(AdtError::Lock { .. }) => None,
        Err(e) => return Err(e.into()),
    };

    ToolsCallResult::json_or_internal(&json!({
        "success": lock_handle.is_some(),
        "lockHandle": lock_handle,
        "objectUrl": object_url,
    }))
}

// ============================================================================
// sap_unlock
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnlockParams {
    #[serde(flatten)]
    object: ObjectArgs,
    #[serde(default)]
    lock_handle: Option<String>,
}

fn unlock_tool() -> RegisteredTool {
    ToolBuilder::new("sap_unlock")
        .description("Unlock an ABAP object using a lock handle.")
        .input_schema(object_schema(
            json!({
                "lockHandle": {
                    "type": "string",
                    "description": "Lock handle returned by sap_lock"
                }
            }),
            &["lockHandle"],
        ))
        .build(unlock_handler)
}

async fn unlock_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: UnlockParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    let object_url = params.object.object_url()?;
    let handle = LockHandle::from(required(&params.lock_handle, "lockHandle")?.to_string());

    let response = lock::unlock(&ctx.client, &object_url, &handle).await?;

    ToolsCallResult::json_or_internal(&json!({
        "success": true,
        "statusCode": response.status,
    }))
}

// ============================================================================
// sap_activate
// ============================================================================

fn activate_tool() -> RegisteredTool {
    ToolBuilder::new("sap_activate")
        .description("Activate an ABAP object after editing. Required to make changes effective.")
        .input_schema(object_schema(json!({}), &[]))
        .build(activate_handler)
}

async fn activate_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ObjectParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    let object_url = params.object.object_url()?;

    let result = lock::activate(&ctx.client, &object_url).await?;
    ToolsCallResult::json_or_internal(&result)
}
