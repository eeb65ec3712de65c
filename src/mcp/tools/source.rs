//! Source Tools
//!
//! Reading and writing ABAP source code.

use serde::Deserialize;
use serde_json::{json, Value};

use super::args::{non_empty, object_schema, ObjectArgs};
use crate::adt::lock::{write_source_detached, SourceWrite};
use crate::adt::object_kind::{is_function_module_url, sanitize_function_module_source};
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

/// Register source tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tools([get_source_tool(), set_source_tool()]);
}

// ============================================================================
// sap_get_source
// ============================================================================

#[derive(Debug, Deserialize)]
struct GetSourceParams {
    #[serde(flatten)]
    object: ObjectArgs,
    #[serde(default)]
    version: Option<String>,
}

fn get_source_tool() -> RegisteredTool {
    ToolBuilder::new("sap_get_source")
        .description(
            "Read source code of an ABAP object. Provide objectType (CLAS/PROG/INTF/etc) + objectName.",
        )
        .input_schema(object_schema(
            json!({
                "version": {
                    "type": "string",
                    "description": "Optional version: 'active', 'inactive', or 'workingArea'"
                }
            }),
            &[],
        ))
        .build(get_source_handler)
}

async fn get_source_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: GetSourceParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let mut path = params.object.source_url()?;
    if let Some(version) = non_empty(&params.version) {
        let separator = if path.contains('?') { '&' } else { '?' };
        path = format!("{}{}version={}", path, separator, urlencoding::encode(version));
    }

    let response = ctx.client.get(&path, "text/plain").await?;
    Ok(ToolsCallResult::text(response.body))
}

// ============================================================================
// sap_set_source
// ============================================================================

#[derive(Debug, Deserialize)]
struct SetSourceParams {
    #[serde(flatten)]
    object: ObjectArgs,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    transport: Option<String>,
}

fn set_source_tool() -> RegisteredTool {
    ToolBuilder::new("sap_set_source")
        .description(
            "Write ABAP source code to existing object. Locks, writes, unlocks, and activates automatically.",
        )
        .input_schema(object_schema(
            json!({
                "source": {
                    "type": "string",
                    "description": "The complete ABAP source code to write"
                },
                "transport": {
                    "type": "string",
                    "description": "Optional transport request number (e.g. 'DEVK900123')"
                }
            }),
            &["source"],
        ))
        .build(set_source_handler)
}

async fn set_source_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SetSourceParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let source_url = params.object.source_url()?;
    let source = params
        .source
        .ok_or_else(|| McpError::InvalidParams("source is required".to_string()))?;
    let source = if is_function_module_url(&source_url) {
        sanitize_function_module_source(&source)
    } else {
        source
    };

    let write = SourceWrite {
        source_url,
        source,
        transport: non_empty(&params.transport).map(str::to_string),
    };

    let outcome = write_source_detached(ctx.client.clone(), write, ctx.lock_policy.clone()).await?;
    ToolsCallResult::json_or_internal(&outcome.to_json())
}
