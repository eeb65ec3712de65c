//! Documentation Tools
//!
//! ABAP keyword, class, function module and type documentation.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::args::{non_empty, required};
use crate::adt::xml::{self, ObjectStructure};
use crate::adt::ObjectKind;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

const DOCU_PATH: &str = "/sap/bc/adt/docu/abap/langu";
const DOCU_ACCEPT: &str = "text/html, text/plain, application/xml";
const CLASS_ACCEPT: &str = "application/vnd.sap.adt.oo.classes.v4+xml, application/xml";

const KNOWN_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MODIFY", "LOOP", "ENDLOOP", "IF", "ENDIF", "CASE",
    "ENDCASE", "DO", "ENDDO", "WHILE", "ENDWHILE", "READ", "APPEND", "COLLECT", "SORT", "CLEAR",
    "DATA", "TYPES", "CONSTANTS", "FIELD-SYMBOLS", "CLASS", "INTERFACE", "METHOD", "ENDMETHOD",
    "TRY", "CATCH", "ENDTRY", "RAISE", "CLEANUP", "CALL", "PERFORM", "FORM", "ENDFORM", "WRITE",
    "MESSAGE", "ASSERT", "OPEN", "CLOSE", "TRANSFER", "RECEIVE", "COMMIT", "ROLLBACK", "SET",
    "GET", "AUTHORITY-CHECK", "ASSIGN", "UNASSIGN", "CONCATENATE", "SPLIT", "REPLACE",
    "TRANSLATE", "CONDENSE", "MOVE", "MOVE-CORRESPONDING", "CORRESPONDING", "NEW", "VALUE", "REF",
    "CAST", "CONV", "COND", "SWITCH", "FOR", "REDUCE", "FILTER", "GROUP BY", "INTO", "FROM",
    "WHERE", "ORDER BY", "UP TO", "STRING_AGG", "COALESCE",
];

/// Register documentation tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(abap_docu_tool());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocuType {
    Keyword,
    Class,
    Function,
    Type,
}

impl DocuType {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "keyword" => Some(DocuType::Keyword),
            "class" => Some(DocuType::Class),
            "function" => Some(DocuType::Function),
            "type" => Some(DocuType::Type),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            DocuType::Keyword => "keyword",
            DocuType::Class => "class",
            DocuType::Function => "function",
            DocuType::Type => "type",
        }
    }

    /// `type` parameter of the docu service; keywords are looked up without one.
    fn type_param(&self) -> Option<&'static str> {
        match self {
            DocuType::Keyword => None,
            DocuType::Class => Some("CLAS"),
            DocuType::Function => Some("FUNC"),
            DocuType::Type => Some("TYPE"),
        }
    }

    /// Guess from naming conventions: class and interface prefixes, then
    /// underscored names that are not statements, then keywords.
    fn detect(term: &str) -> Self {
        let class_like = ["CL_", "ZCL_", "YCL_", "IF_", "ZIF_"]
            .iter()
            .any(|prefix| term.starts_with(prefix))
            || term.contains("/CL_");
        if class_like {
            return DocuType::Class;
        }
        if term.contains('_') && !is_known_keyword(term) {
            return DocuType::Function;
        }
        DocuType::Keyword
    }
}

fn is_known_keyword(term: &str) -> bool {
    KNOWN_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(term))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbapDocuParams {
    #[serde(default)]
    search_term: Option<String>,
    #[serde(default)]
    docu_type: Option<String>,
}

fn abap_docu_tool() -> RegisteredTool {
    ToolBuilder::new("sap_abap_docu")
        .description(
            "Get ABAP documentation for keywords, statements, classes, methods, or function modules. \
             Use this to look up syntax, parameters, and usage examples.",
        )
        .input_schema(json!({
            "type": "object",
            "properties": {
                "searchTerm": {
                    "type": "string",
                    "description": "The ABAP element to look up (e.g. 'SELECT', 'LOOP', 'CL_SALV_TABLE', 'STRING_AGG')"
                },
                "docuType": {
                    "type": "string",
                    "description": "Documentation type: 'keyword' (ABAP statements), 'class' (global class), 'function' (function module), 'type' (data type). Default: auto-detect"
                }
            },
            "required": ["searchTerm"]
        }))
        .build(abap_docu_handler)
}

fn docu_path(term: &str, docu_type: DocuType, language: &str) -> String {
    let type_param = docu_type
        .type_param()
        .map(|code| format!("&type={}", code))
        .unwrap_or_default();
    format!(
        "{}?object={}{}&language={}",
        DOCU_PATH,
        urlencoding::encode(term),
        type_param,
        urlencoding::encode(language)
    )
}

/// Docu service lookup. Backend failures count as "no documentation".
async fn fetch_docu(ctx: &ToolContext, term: &str, docu_type: DocuType) -> Option<String> {
    let path = docu_path(term, docu_type, ctx.client.language());
    match ctx.client.get(&path, DOCU_ACCEPT).await {
        Ok(response) => Some(xml::parse_abap_docu(&response.body)).filter(|docu| !docu.is_empty()),
        Err(e) => {
            debug!("No {} docu for {}: {}", docu_type.name(), term, e);
            None
        }
    }
}

/// Class docu, falling back to a summary of the class metadata.
async fn fetch_class_docu(ctx: &ToolContext, class_name: &str) -> Option<String> {
    if let Some(docu) = fetch_docu(ctx, class_name, DocuType::Class).await {
        return Some(docu);
    }

    let object_url = ObjectKind::Class.object_url(class_name);
    match ctx.client.get(&object_url, CLASS_ACCEPT).await {
        Ok(response) => Some(format_class_structure(
            class_name,
            &xml::parse_object_structure(&response.body),
        )),
        Err(e) => {
            debug!("No class metadata for {}: {}", class_name, e);
            None
        }
    }
}

fn format_class_structure(class_name: &str, structure: &ObjectStructure) -> String {
    let mut out = format!("Class: {}\n", class_name);
    if !structure.description.is_empty() {
        out.push_str(&format!("Description: {}\n", structure.description));
    }
    if let Some(package) = &structure.package_name {
        out.push_str(&format!("Package: {}\n", package));
    }
    if !structure.includes.is_empty() {
        out.push_str("\nIncludes:\n");
        for include in &structure.includes {
            out.push_str(&format!("  - {}: {}\n", include.include_type, include.name));
        }
    }
    out
}

async fn abap_docu_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: AbapDocuParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    let search_term = required(&params.search_term, "searchTerm")?.to_uppercase();

    // An unrecognized docuType is echoed back and searched as keyword, then class
    let docu_type = non_empty(&params.docu_type)
        .map(str::to_string)
        .unwrap_or_else(|| DocuType::detect(&search_term).name().to_string());

    let documentation = match DocuType::from_name(&docu_type) {
        Some(DocuType::Class) => fetch_class_docu(&ctx, &search_term).await,
        Some(kind) => fetch_docu(&ctx, &search_term, kind).await,
        None => match fetch_docu(&ctx, &search_term, DocuType::Keyword).await {
            Some(docu) => Some(docu),
            None => fetch_class_docu(&ctx, &search_term).await,
        },
    };

    let mut result = json!({
        "searchTerm": search_term,
        "docuType": docu_type,
    });
    match documentation {
        Some(documentation) => {
            result["found"] = json!(true);
            result["documentation"] = json!(documentation);
        }
        None => {
            result["found"] = json!(false);
            result["message"] = json!(format!("No documentation found for '{}'", search_term));
        }
    }

    ToolsCallResult::json_or_internal(&result)
}
