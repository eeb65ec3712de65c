//! Quality Tools
//!
//! Syntax check, ABAP Unit and ATC runs.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::args::{object_schema, ObjectArgs};
use crate::adt::xml::{self, escape_xml};
use crate::adt::AdtResponse;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};

const CHECKRUN_PATH: &str = "/sap/bc/adt/checkruns?reporters=abapCheckRun";
const UNIT_TEST_PATH: &str = "/sap/bc/adt/abapunit/testruns";
const ATC_WORKLISTS_PATH: &str = "/sap/bc/adt/atc/worklists";
const ATC_RUNS_PATH: &str = "/sap/bc/adt/atc/runs";

const ATC_CHECK_VARIANT: &str = "DEFAULT";
const ATC_MAX_VERDICTS: u32 = 100;

/// Register quality tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tools([syntax_check_tool(), run_unit_test_tool(), atc_run_tool()]);
}

#[derive(Debug, Deserialize)]
struct ObjectParams {
    #[serde(flatten)]
    object: ObjectArgs,
}

fn parse_object_params(params: Value) -> Result<ObjectArgs, McpError> {
    let params: ObjectParams =
        serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))?;
    Ok(params.object)
}

// ============================================================================
// sap_syntax_check
// ============================================================================

fn syntax_check_tool() -> RegisteredTool {
    ToolBuilder::new("sap_syntax_check")
        .description(
            "Run ABAP syntax check on source code. Returns errors and warnings with line numbers.",
        )
        .input_schema(object_schema(json!({}), &[]))
        .build(syntax_check_handler)
}

fn checkrun_xml(source_url: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <chkrun:checkObjectList xmlns:chkrun=\"http://www.sap.com/adt/checkrun\" \
         xmlns:adtcore=\"http://www.sap.com/adt/core\">\n  \
         <chkrun:checkObject chkrun:uri=\"{}\"/>\n\
         </chkrun:checkObjectList>",
        escape_xml(source_url)
    )
}

async fn syntax_check_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let source_url = parse_object_params(params)?.source_url()?;

    let response = ctx
        .client
        .post(
            CHECKRUN_PATH,
            &checkrun_xml(&source_url),
            "application/vnd.sap.adt.checkobjects+xml",
            "application/vnd.sap.adt.checkmessages+xml",
        )
        .await?;

    let messages = xml::parse_syntax_check(&response.body);
    let count = |severity: &str| {
        messages
            .iter()
            .filter(|m| m.severity.eq_ignore_ascii_case(severity))
            .count()
    };
    let errors = count("error");
    let warnings = count("warning");

    ToolsCallResult::json_or_internal(&json!({
        "errors": errors,
        "warnings": warnings,
        "success": errors == 0,
        "messages": messages,
    }))
}

// ============================================================================
// sap_run_unit_test
// ============================================================================

fn run_unit_test_tool() -> RegisteredTool {
    ToolBuilder::new("sap_run_unit_test")
        .description("Run ABAP Unit tests. Returns pass/fail per test class and method.")
        .input_schema(object_schema(json!({}), &[]))
        .build(run_unit_test_handler)
}

fn unit_test_xml(object_url: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <aunit:runConfiguration xmlns:aunit=\"http://www.sap.com/adt/aunit\">\
         <external><coverage active=\"false\"/></external>\
         <options>\
         <uriType value=\"semantic\"/>\
         <testDeterminationStrategy sameProgram=\"true\" assignedTests=\"false\"/>\
         <testRiskLevels harmless=\"true\" dangerous=\"false\" critical=\"false\"/>\
         <testDurations short=\"true\" medium=\"false\" long=\"false\"/>\
         <withNavigationUri enabled=\"false\"/>\
         </options>\
         <adtcore:objectSets xmlns:adtcore=\"http://www.sap.com/adt/core\">\
         <objectSet kind=\"inclusive\">\
         <adtcore:objectReferences>\
         <adtcore:objectReference adtcore:uri=\"{}\"/>\
         </adtcore:objectReferences>\
         </objectSet>\
         </adtcore:objectSets>\
         </aunit:runConfiguration>",
        escape_xml(object_url)
    )
}

async fn run_unit_test_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let object_url = parse_object_params(params)?.object_url()?;

    let response = ctx
        .client
        .post(
            UNIT_TEST_PATH,
            &unit_test_xml(&object_url),
            "application/*",
            "application/*",
        )
        .await?;

    ToolsCallResult::json_or_internal(&xml::parse_unit_test_results(&response.body))
}

// ============================================================================
// sap_atc_run
// ============================================================================

fn atc_run_tool() -> RegisteredTool {
    ToolBuilder::new("sap_atc_run")
        .description("Run ATC quality checks. Returns findings with priority and messages.")
        .input_schema(object_schema(json!({}), &[]))
        .build(atc_run_handler)
}

fn atc_run_xml(object_url: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <atc:run maximumVerdicts=\"{}\" xmlns:atc=\"http://www.sap.com/adt/atc\">\
         <objectSets xmlns:adtcore=\"http://www.sap.com/adt/core\">\
         <objectSet kind=\"inclusive\">\
         <adtcore:objectReferences>\
         <adtcore:objectReference adtcore:uri=\"{}\"/>\
         </adtcore:objectReferences>\
         </objectSet>\
         </objectSets>\
         </atc:run>",
        ATC_MAX_VERDICTS,
        escape_xml(object_url)
    )
}

/// Last path segment of the run's `Location` header, query stripped.
fn worklist_id_from_location(response: &AdtResponse) -> Option<String> {
    let location = response.header("location")?;
    let (_, id) = location.rsplit_once('/')?;
    let id = id.split('?').next().unwrap_or_default();
    (!id.is_empty()).then(|| id.to_string())
}

async fn create_worklist(ctx: &ToolContext) -> String {
    let path = format!(
        "{}?checkVariant={}",
        ATC_WORKLISTS_PATH,
        urlencoding::encode(ATC_CHECK_VARIANT)
    );
    match ctx
        .client
        .post(&path, "", "application/xml", "text/plain")
        .await
    {
        Ok(response) if !response.body.trim().is_empty() => response.body.trim().to_string(),
        Ok(_) => ATC_CHECK_VARIANT.to_string(),
        Err(e) => {
            warn!("Failed to create ATC worklist, using {}: {}", ATC_CHECK_VARIANT, e);
            ATC_CHECK_VARIANT.to_string()
        }
    }
}

async fn atc_run_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let object_url = parse_object_params(params)?.object_url()?;

    let mut worklist_id = create_worklist(&ctx).await;

    let run_path = format!(
        "{}?worklistId={}",
        ATC_RUNS_PATH,
        urlencoding::encode(&worklist_id)
    );
    let run = ctx
        .client
        .post(
            &run_path,
            &atc_run_xml(&object_url),
            "application/xml",
            "application/xml",
        )
        .await?;
    if let Some(id) = worklist_id_from_location(&run) {
        worklist_id = id;
    }
    debug!("ATC run for {} in worklist {}", object_url, worklist_id);

    let response = ctx
        .client
        .get(
            &format!(
                "{}/{}",
                ATC_WORKLISTS_PATH,
                urlencoding::encode(&worklist_id)
            ),
            "application/atc.worklist.v1+xml",
        )
        .await?;

    let mut worklist = xml::parse_atc_worklist(&response.body);
    worklist.worklist_id = worklist_id;
    ToolsCallResult::json_or_internal(&worklist)
}
