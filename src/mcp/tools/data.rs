//! Data Tools
//!
//! Freestyle ABAP SQL through the data preview service.

use serde::Deserialize;
use serde_json::Value;

use super::args::required;
use crate::adt::xml;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

const FREESTYLE_PATH: &str = "/sap/bc/adt/datapreview/freestyle";

/// Register data tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(sql_query_tool());
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SqlQueryParams {
    #[serde(default)]
    query: Option<String>,
    #[serde(default = "default_max_rows")]
    max_rows: u32,
}

fn default_max_rows() -> u32 {
    100
}

fn sql_query_tool() -> RegisteredTool {
    ToolBuilder::new("sap_sql_query")
        .description(
            "Execute an ABAP SQL SELECT query against SAP database tables and return DATA ROWS.",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The ABAP SQL query (e.g. 'SELECT * FROM mara UP TO 10 ROWS')"
                },
                "maxRows": {
                    "type": "integer",
                    "description": "Maximum rows to return (default: 100)",
                    "minimum": 1
                }
            },
            "required": ["query"]
        }))
        .build(sql_query_handler)
}

async fn sql_query_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SqlQueryParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    let query = required(&params.query, "query")?;

    let path = format!("{}?rowNumber={}", FREESTYLE_PATH, params.max_rows);
    let response = ctx
        .client
        .post(
            &path,
            query,
            "text/plain; charset=utf-8",
            "application/vnd.sap.adt.datapreview.table.v1+xml",
        )
        .await?;

    ToolsCallResult::json_or_internal(&xml::parse_data_preview(&response.body))
}
