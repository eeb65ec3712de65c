//! Repository Tools
//!
//! Searching, creating and inspecting repository objects.

use serde::Deserialize;
use serde_json::{json, Value};

use super::args::{non_empty, object_schema, required, ObjectArgs};
use crate::adt::object_kind::{CreationSpec, UnknownObjectKind};
use crate::adt::xml::{self, escape_xml};
use crate::adt::ObjectKind;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

const SEARCH_PATH: &str = "/sap/bc/adt/repository/informationsystem/search";
const USAGE_REFERENCES_PATH: &str = "/sap/bc/adt/repository/informationsystem/usagereferences";
const INACTIVE_OBJECTS_PATH: &str = "/sap/bc/adt/activation/inactiveobjects";

const MAX_DESCRIPTION_CHARS: usize = 60;

/// Register repository tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tools([
        search_object_tool(),
        create_object_tool(),
        object_structure_tool(),
        usage_references_tool(),
        inactive_objects_tool(),
    ]);
}

#[derive(Debug, Deserialize)]
struct ObjectParams {
    #[serde(flatten)]
    object: ObjectArgs,
}

// ============================================================================
// sap_search_object
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    obj_type: Option<String>,
    #[serde(default = "default_max")]
    max: u32,
}

fn default_max() -> u32 {
    100
}

fn search_object_tool() -> RegisteredTool {
    ToolBuilder::new("sap_search_object")
        .description("Search for ABAP objects by name pattern. Returns names, types, and URIs.")
        .input_schema(json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query string (supports wildcards, e.g. 'Z_MY_*')"
                },
                "objType": {
                    "type": "string",
                    "description": "Optional ADT object type filter (e.g. 'PROG/P' for programs, 'CLAS/OC' for classes)"
                },
                "max": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default 100)",
                    "minimum": 1
                }
            },
            "required": ["query"]
        }))
        .build(search_object_handler)
}

async fn search_object_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SearchParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    let query = required(&params.query, "query")?;

    let mut path = format!(
        "{}?operation=quickSearch&query={}&maxResults={}",
        SEARCH_PATH,
        urlencoding::encode(query),
        params.max
    );
    if let Some(obj_type) = non_empty(&params.obj_type) {
        path.push_str(&format!("&objectType={}", urlencoding::encode(obj_type)));
    }

    let response = ctx.client.get(&path, "application/*").await?;
    let results = xml::parse_search_results(&response.body);

    ToolsCallResult::json_or_internal(&json!({
        "totalResults": results.len(),
        "results": results,
    }))
}

// ============================================================================
// sap_create_object
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateParams {
    #[serde(default)]
    objtype: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    transport: Option<String>,
}

fn create_object_tool() -> RegisteredTool {
    ToolBuilder::new("sap_create_object")
        .description("Create a new ABAP object (program, class, interface, function group).")
        .input_schema(json!({
            "type": "object",
            "properties": {
                "objtype": {
                    "type": "string",
                    "description": "ADT object type: 'PROG/P' (program), 'CLAS/OC' (class), 'INTF/OI' (interface), 'FUGR/F' (function group)"
                },
                "name": {
                    "type": "string",
                    "description": "Object name (e.g. 'ZTEST_PROGRAM')"
                },
                "parentName": {
                    "type": "string",
                    "description": "Parent package name (e.g. '$TMP')"
                },
                "description": {
                    "type": "string",
                    "description": "Short description"
                },
                "transport": {
                    "type": "string",
                    "description": "Optional transport request number"
                }
            },
            "required": ["objtype", "name", "parentName", "description"]
        }))
        .build(create_object_handler)
}

fn creation_xml(creation: &CreationSpec, name: &str, package: &str, description: &str) -> String {
    let extra = if creation.adt_type == "CLAS/OC" {
        " class:final=\"true\" class:visibility=\"public\""
    } else {
        ""
    };

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <{root} {ns} xmlns:adtcore=\"http://www.sap.com/adt/core\" \
         adtcore:description=\"{description}\" adtcore:language=\"EN\" \
         adtcore:name=\"{name}\" adtcore:type=\"{adt_type}\" adtcore:masterLanguage=\"EN\"{extra}>\
         <adtcore:packageRef adtcore:name=\"{package}\"/>\
         </{root}>",
        root = creation.root_element,
        ns = creation.namespace,
        description = escape_xml(description),
        name = escape_xml(name),
        adt_type = creation.adt_type,
        extra = extra,
        package = escape_xml(package),
    )
}

async fn create_object_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: CreateParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;

    let objtype = required(&params.objtype, "objtype")?;
    let name = required(&params.name, "name")?;
    let package = required(&params.parent_name, "parentName")?;
    let description: String = required(&params.description, "description")?
        .chars()
        .take(MAX_DESCRIPTION_CHARS)
        .collect();

    let kind: ObjectKind = objtype
        .parse()
        .map_err(|e: UnknownObjectKind| McpError::InvalidParams(e.to_string()))?;
    let creation = kind.creation_spec().ok_or_else(|| {
        McpError::InvalidParams(format!(
            "Unsupported type: {}. Supported: PROG/P, CLAS/OC, INTF/OI, FUGR/F",
            objtype
        ))
    })?;

    let mut path = kind.collection_url().to_string();
    if let Some(transport) = non_empty(&params.transport) {
        path.push_str(&format!("?corrNr={}", urlencoding::encode(transport)));
    }

    let body = creation_xml(&creation, name, package, &description);
    let accept = format!("{}, application/xml", creation.content_type);
    let response = ctx
        .client
        .post(&path, &body, creation.content_type, &accept)
        .await?;

    ToolsCallResult::json_or_internal(&json!({
        "status": "created",
        "name": name,
        "type": creation.adt_type,
        "statusCode": response.status,
        "objectUrl": kind.object_url(name),
    }))
}

// ============================================================================
// sap_object_structure
// ============================================================================

fn object_structure_tool() -> RegisteredTool {
    ToolBuilder::new("sap_object_structure")
        .description(
            "Get structure/metadata of an ABAP object. Returns links, includes, and source URLs.",
        )
        .input_schema(object_schema(json!({}), &[]))
        .build(object_structure_handler)
}

async fn object_structure_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ObjectParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    let object_url = params.object.object_url()?;

    let response = ctx.client.get(&object_url, "application/*").await?;
    ToolsCallResult::json_or_internal(&xml::parse_object_structure(&response.body))
}

// ============================================================================
// sap_usage_references
// ============================================================================

fn usage_references_tool() -> RegisteredTool {
    ToolBuilder::new("sap_usage_references")
        .description("Find all usages (where-used) of an ABAP element across the system.")
        .input_schema(object_schema(json!({}), &[]))
        .build(usage_references_handler)
}

async fn usage_references_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ObjectParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    let object_url = params.object.object_url()?;

    let path = format!(
        "{}?uri={}",
        USAGE_REFERENCES_PATH,
        urlencoding::encode(&object_url)
    );
    let response = ctx
        .client
        .post(&path, "", "application/*", "application/*")
        .await?;

    ToolsCallResult::json_or_internal(&json!({
        "statusCode": response.status,
        "response": response.body,
    }))
}

// ============================================================================
// sap_inactive_objects
// ============================================================================

fn inactive_objects_tool() -> RegisteredTool {
    ToolBuilder::new("sap_inactive_objects")
        .description("List all inactive (not yet activated) ABAP objects for the current user.")
        .build(inactive_objects_handler)
}

async fn inactive_objects_handler(ctx: ToolContext, _params: Value) -> ToolResult {
    let response = ctx
        .client
        .get(
            INACTIVE_OBJECTS_PATH,
            "application/vnd.sap.adt.inactivectsobjects.v1+xml",
        )
        .await?;
    ToolsCallResult::json_or_internal(&xml::parse_inactive_objects(&response.body))
}
