//! Translators from ADT XML payloads to structured records.
//!
//! Translators never fail: malformed input yields the default record and a
//! logged diagnostic. Elements are matched by local name so namespace
//! prefixes do not matter.

use lazy_static::lazy_static;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML parse error at position {position}: {message}")]
    Malformed { position: u64, message: String },

    #[error("unclosed element(s): <{0}>")]
    Unclosed(String),

    #[error("empty document: no root element found")]
    Empty,
}

// ============================================================================
// Element tree
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

impl XmlElement {
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// First non-empty value among `keys`, matched by qualified name.
    pub fn attr(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| {
            self.attributes
                .iter()
                .find(|(name, value)| name == key && !value.is_empty())
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn attr_or_empty(&self, keys: &[&str]) -> String {
        self.attr(keys).unwrap_or_default().to_string()
    }

    /// Concatenated text of this element and all of its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(element) => element.collect_text(out),
            }
        }
    }

    /// Descendants (not self) with the given local name, in document order.
    pub fn descendants(&self, local: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        for child in &self.children {
            if let XmlNode::Element(element) = child {
                element.collect_named(local, &mut found);
            }
        }
        found
    }

    /// Like [`XmlElement::descendants`] but includes the element itself.
    pub fn find_all(&self, local: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.collect_named(local, &mut found);
        found
    }

    /// First non-empty result among several local names.
    pub fn find_all_any(&self, locals: &[&str]) -> Vec<&XmlElement> {
        locals
            .iter()
            .map(|local| self.find_all(local))
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }

    fn collect_named<'a>(&'a self, local: &str, found: &mut Vec<&'a XmlElement>) {
        if self.local_name() == local {
            found.push(self);
        }
        for child in &self.children {
            if let XmlNode::Element(element) = child {
                element.collect_named(local, found);
            }
        }
    }

    fn child_text(&self, local: &str) -> Option<String> {
        self.descendants(local)
            .first()
            .map(|element| element.text().trim().to_string())
            .filter(|text| !text.is_empty())
    }

    fn child_attr(&self, local: &str, keys: &[&str]) -> Option<String> {
        self.descendants(local)
            .first()
            .and_then(|element| element.attr(keys))
            .map(str::to_string)
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

pub fn parse_document(xml: &str) -> Result<XmlElement, XmlError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    let malformed = |reader: &Reader<&[u8]>, message: String| XmlError::Malformed {
        position: reader.error_position() as u64,
        message,
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let element = start_element(e).map_err(|msg| malformed(&reader, msg))?;
                stack.push(element);
            }
            Ok(Event::End(_)) => {
                let completed = stack
                    .pop()
                    .ok_or_else(|| malformed(&reader, "unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, completed);
            }
            Ok(Event::Empty(ref e)) => {
                let element = start_element(e).map_err(|msg| malformed(&reader, msg))?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| malformed(&reader, err.to_string()))?
                    .to_string();
                if let Some(parent) = stack.last_mut() {
                    if !text.trim().is_empty() {
                        parent.children.push(XmlNode::Text(text));
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).to_string();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(text));
                }
            }
            Ok(Event::Eof) => {
                if !stack.is_empty() {
                    let unclosed: Vec<&str> = stack.iter().map(|el| el.name.as_str()).collect();
                    return Err(XmlError::Unclosed(unclosed.join(">, <")));
                }
                break;
            }
            Ok(_) => {}
            Err(e) => return Err(malformed(&reader, e.to_string())),
        }
    }

    root.ok_or(XmlError::Empty)
}

fn start_element(e: &BytesStart) -> Result<XmlElement, String> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|err| format!("invalid element name: {err}"))?
        .to_string();

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| format!("attribute error: {err}"))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| format!("attribute key error: {err}"))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| format!("attribute value error: {err}"))?
            .to_string();
        attributes.push((key, value));
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => *root = Some(element),
    }
}

/// Parses `xml`, logging and returning `None` when it is blank or malformed.
fn parse_or_log(xml: &str, what: &str) -> Option<XmlElement> {
    if xml.trim().is_empty() {
        return None;
    }
    match parse_document(xml) {
        Ok(root) => Some(root),
        Err(e) => {
            warn!("Failed to parse {} XML: {}", what, e);
            None
        }
    }
}

/// `#start=<line>,<offset>` fragment of a source URI.
fn start_position(uri: &str) -> (String, String) {
    match uri.find("#start=") {
        Some(idx) => {
            let mut parts = uri[idx + 7..].split(',');
            let line = parts.next().unwrap_or_default().to_string();
            let offset = parts.next().unwrap_or_default().to_string();
            (line, offset)
        }
        None => (String::new(), String::new()),
    }
}

pub fn escape_xml(value: &str) -> String {
    quick_xml::escape::escape(value).to_string()
}

// ============================================================================
// Lock handle
// ============================================================================

pub fn extract_lock_handle(xml: &str) -> Option<String> {
    let root = parse_or_log(xml, "lock result")?;
    root.find_all_any(&["LOCK_HANDLE", "lock_handle"])
        .first()
        .map(|element| element.text().trim().to_string())
        .filter(|handle| !handle.is_empty())
}

// ============================================================================
// Repository search
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub uri: String,
    pub description: String,
    pub package_name: String,
}

pub fn parse_search_results(xml: &str) -> Vec<SearchResult> {
    let Some(root) = parse_or_log(xml, "search result") else {
        return Vec::new();
    };

    let references = root.find_all("objectReference");
    if !references.is_empty() {
        return references
            .into_iter()
            .map(|reference| SearchResult {
                name: reference.attr_or_empty(&["adtcore:name", "name"]),
                object_type: reference.attr_or_empty(&["adtcore:type", "type"]),
                uri: reference.attr_or_empty(&["adtcore:uri", "uri"]),
                description: reference.attr_or_empty(&["adtcore:description", "description"]),
                package_name: reference.attr_or_empty(&["adtcore:packageName", "packageName"]),
            })
            .collect();
    }

    root.find_all("entry")
        .into_iter()
        .map(|entry| SearchResult {
            name: entry.child_text("title").unwrap_or_default(),
            object_type: entry.child_text("category").unwrap_or_default(),
            uri: entry.child_attr("link", &["href"]).unwrap_or_default(),
            description: entry.child_text("summary").unwrap_or_default(),
            package_name: String::new(),
        })
        .collect()
}

// ============================================================================
// Syntax check
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SyntaxMessage {
    pub uri: String,
    pub line: String,
    pub offset: String,
    pub severity: String,
    pub text: String,
}

pub fn parse_syntax_check(xml: &str) -> Vec<SyntaxMessage> {
    let Some(root) = parse_or_log(xml, "syntax check") else {
        return Vec::new();
    };

    root.find_all("checkMessage")
        .into_iter()
        .map(|message| {
            let uri = message.attr_or_empty(&["chkrun:uri", "uri"]);
            let (line, offset) = start_position(&uri);
            let kind = message.attr_or_empty(&["chkrun:type", "type"]);
            let severity = match kind.to_uppercase().as_str() {
                "E" => "error".to_string(),
                "W" => "warning".to_string(),
                "I" => "info".to_string(),
                _ => kind,
            };
            SyntaxMessage {
                uri,
                line,
                offset,
                severity,
                text: message.attr_or_empty(&["chkrun:shortText", "shortText"]),
            }
        })
        .collect()
}

// ============================================================================
// Activation
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ActivationResult {
    pub success: bool,
    pub messages: Vec<String>,
}

/// Activation succeeds unless a message or the root reports error severity.
/// An empty response body counts as success.
pub fn parse_activation_result(xml: &str) -> ActivationResult {
    if xml.trim().is_empty() {
        return ActivationResult {
            success: true,
            messages: Vec::new(),
        };
    }

    let root = match parse_document(xml) {
        Ok(root) => root,
        Err(e) => {
            warn!("Failed to parse activation XML: {}", e);
            return ActivationResult {
                success: false,
                messages: vec![format!("Parse error: {}", e)],
            };
        }
    };

    let root_severity = root.attr(&["severity", "chkrun:severity"]).unwrap_or_default();
    let mut success = true;
    let mut messages = Vec::new();

    for message in root.find_all_any(&["msg", "message"]) {
        let text = message.text();
        let text = if text.trim().is_empty() {
            message.attr_or_empty(&["text", "shortText"])
        } else {
            text
        };
        if !text.trim().is_empty() {
            messages.push(text.trim().to_string());
        }

        let severity = message
            .attr(&["severity", "type"])
            .unwrap_or_default()
            .to_lowercase();
        if severity.contains("error") || severity == "e" {
            success = false;
        }
    }

    if root_severity.eq_ignore_ascii_case("error") || root_severity.eq_ignore_ascii_case("e") {
        success = false;
    }

    if messages.is_empty() && success {
        debug!("Activation response has no messages, assuming success");
    }

    ActivationResult { success, messages }
}

// ============================================================================
// ABAP Unit
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UnitTestAlert {
    pub kind: String,
    pub severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestMethod {
    pub name: String,
    pub execution_time: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TestClass {
    pub name: String,
    pub methods: Vec<TestMethod>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestProgram {
    pub name: String,
    pub uri: String,
    pub test_classes: Vec<TestClass>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UnitTestResult {
    pub success: bool,
    pub alerts: Vec<UnitTestAlert>,
    pub programs: Vec<TestProgram>,
}

impl Default for UnitTestResult {
    fn default() -> Self {
        Self {
            success: true,
            alerts: Vec::new(),
            programs: Vec::new(),
        }
    }
}

pub fn parse_unit_test_results(xml: &str) -> UnitTestResult {
    let mut result = UnitTestResult::default();
    let Some(root) = parse_or_log(xml, "unit test result") else {
        return result;
    };

    for alert in root.find_all("alert") {
        let severity = alert.attr_or_empty(&["severity"]);
        let lowered = severity.to_lowercase();
        if lowered.contains("fatal") || lowered.contains("critical") {
            result.success = false;
        }
        result.alerts.push(UnitTestAlert {
            kind: alert.attr_or_empty(&["kind"]),
            severity,
            title: alert.descendants("title").first().map(|t| t.text()),
            detail: alert.descendants("detail").first().map(|d| d.text()),
        });
    }

    for program in root.find_all("program") {
        let mut test_classes = Vec::new();
        for class in program.descendants("testClass") {
            let mut methods = Vec::new();
            for method in class.descendants("testMethod") {
                let status = match method.descendants("alert").first() {
                    Some(alert) => {
                        let kind = alert.attr_or_empty(&["kind"]);
                        if kind.eq_ignore_ascii_case("failedAssertion")
                            || kind.eq_ignore_ascii_case("error")
                        {
                            result.success = false;
                        }
                        if kind.is_empty() {
                            "passed".to_string()
                        } else {
                            kind
                        }
                    }
                    None => "passed".to_string(),
                };
                methods.push(TestMethod {
                    name: method.attr_or_empty(&["adtcore:name", "name"]),
                    execution_time: method
                        .attr(&["executionTime"])
                        .unwrap_or("0")
                        .to_string(),
                    status,
                });
            }
            test_classes.push(TestClass {
                name: class.attr_or_empty(&["adtcore:name", "name"]),
                methods,
            });
        }
        result.programs.push(TestProgram {
            name: program.attr_or_empty(&["adtcore:name", "name"]),
            uri: program.attr_or_empty(&["adtcore:uri", "uri"]),
            test_classes,
        });
    }

    result
}

// ============================================================================
// Data preview
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PreviewColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataPreview {
    pub columns: Vec<PreviewColumn>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
}

pub fn parse_data_preview(xml: &str) -> DataPreview {
    let Some(root) = parse_or_log(xml, "data preview") else {
        return DataPreview::default();
    };

    let columns = root
        .find_all("column")
        .into_iter()
        .enumerate()
        .map(|(i, column)| PreviewColumn {
            name: column
                .attr(&["dataPreview:name", "name"])
                .map(str::to_string)
                .unwrap_or_else(|| format!("COL{}", i)),
            column_type: column.attr_or_empty(&["dataPreview:type", "type"]),
            description: column.attr_or_empty(&["dataPreview:description", "description"]),
        })
        .collect();

    let rows: Vec<Vec<String>> = root
        .find_all("row")
        .into_iter()
        .map(|row| {
            row.descendants("value")
                .into_iter()
                .map(|value| value.text())
                .collect()
        })
        .collect();

    DataPreview {
        columns,
        row_count: rows.len(),
        rows,
    }
}

// ============================================================================
// ATC
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AtcFinding {
    pub check_id: String,
    pub check_title: String,
    pub message_id: String,
    pub message_title: String,
    pub priority: String,
    pub uri: String,
    pub line: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ObjectRef {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AtcWorklist {
    pub findings: Vec<AtcFinding>,
    pub total_findings: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub objects: Vec<ObjectRef>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub worklist_id: String,
}

pub fn parse_atc_worklist(xml: &str) -> AtcWorklist {
    let Some(root) = parse_or_log(xml, "ATC worklist") else {
        return AtcWorklist::default();
    };

    let findings: Vec<AtcFinding> = root
        .find_all_any(&["atcfinding", "finding"])
        .into_iter()
        .map(|finding| {
            let uri = finding.attr_or_empty(&["uri", "location"]);
            let (line, _) = start_position(&uri);
            AtcFinding {
                check_id: finding.attr_or_empty(&["checkId"]),
                check_title: finding.attr_or_empty(&["checkTitle"]),
                message_id: finding.attr_or_empty(&["messageId"]),
                message_title: finding.attr_or_empty(&["messageTitle", "shortText"]),
                priority: finding.attr_or_empty(&["priority"]),
                uri,
                line,
            }
        })
        .collect();

    let objects = root
        .find_all_any(&["atcobject", "object"])
        .into_iter()
        .map(|object| ObjectRef {
            name: object.attr_or_empty(&["adtcore:name", "name"]),
            object_type: object.attr_or_empty(&["adtcore:type", "type"]),
            uri: object.attr_or_empty(&["adtcore:uri", "uri"]),
        })
        .collect();

    AtcWorklist {
        total_findings: findings.len(),
        findings,
        objects,
        worklist_id: String::new(),
    }
}

// ============================================================================
// Inactive objects
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct InactiveObject {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub uri: String,
    pub description: String,
    pub user: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InactiveObjects {
    pub inactive_objects: Vec<InactiveObject>,
    pub count: usize,
}

pub fn parse_inactive_objects(xml: &str) -> InactiveObjects {
    let Some(root) = parse_or_log(xml, "inactive objects") else {
        return InactiveObjects::default();
    };

    let inactive_objects: Vec<InactiveObject> = root
        .find_all_any(&["entry", "inactiveObject", "objectReference"])
        .into_iter()
        .map(|entry| InactiveObject {
            name: entry
                .attr(&["adtcore:name", "name"])
                .map(str::to_string)
                .or_else(|| entry.child_attr("ref", &["adtcore:name"]))
                .or_else(|| entry.child_text("title"))
                .unwrap_or_default(),
            object_type: entry
                .attr(&["adtcore:type", "type"])
                .map(str::to_string)
                .or_else(|| entry.child_attr("ref", &["adtcore:type"]))
                .unwrap_or_default(),
            uri: entry
                .attr(&["adtcore:uri", "uri"])
                .map(str::to_string)
                .or_else(|| entry.child_attr("ref", &["adtcore:uri"]))
                .or_else(|| entry.child_attr("link", &["href"]))
                .unwrap_or_default(),
            description: entry
                .attr(&["adtcore:description", "description"])
                .map(str::to_string)
                .or_else(|| entry.child_text("summary"))
                .unwrap_or_default(),
            user: entry
                .attr(&["adtcore:responsible", "responsible"])
                .map(str::to_string)
                .or_else(|| entry.child_attr("object", &["ioc:user", "user"]))
                .unwrap_or_default(),
        })
        .collect();

    InactiveObjects {
        count: inactive_objects.len(),
        inactive_objects,
    }
}

// ============================================================================
// Object structure
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Include {
    pub name: String,
    #[serde(rename = "type")]
    pub include_kind: String,
    pub include_type: String,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FunctionModule {
    pub name: String,
    pub description: String,
    pub uri: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStructure {
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub description: String,
    pub version: String,
    pub created_by: String,
    pub changed_by: String,
    pub master_language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<Include>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub function_modules: Vec<FunctionModule>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

pub fn parse_object_structure(xml: &str) -> ObjectStructure {
    let Some(root) = parse_or_log(xml, "object structure") else {
        return ObjectStructure::default();
    };

    let package_name = root
        .find_all("packageRef")
        .first()
        .map(|package| package.attr_or_empty(&["adtcore:name", "name"]));

    let includes = root
        .find_all("include")
        .into_iter()
        .map(|include| Include {
            name: include.attr_or_empty(&["adtcore:name", "name"]),
            include_kind: include.attr_or_empty(&["adtcore:type", "type"]),
            include_type: include.attr_or_empty(&["includeType", "class:includeType"]),
            uri: include.attr_or_empty(&["adtcore:uri", "uri"]),
            source_uri: include
                .descendants("link")
                .into_iter()
                .find(|link| {
                    let rel = link.attr(&["rel"]).unwrap_or_default();
                    rel.contains("source") || rel.contains("main")
                })
                .map(|link| link.attr_or_empty(&["href"])),
        })
        .collect();

    let function_modules = root
        .find_all_any(&["fmodule", "functionModule"])
        .into_iter()
        .map(|function| FunctionModule {
            name: function.attr_or_empty(&["adtcore:name", "name"]),
            description: function.attr_or_empty(&["adtcore:description", "description"]),
            uri: function.attr_or_empty(&["adtcore:uri", "uri"]),
        })
        .collect();

    let links = root
        .find_all("link")
        .into_iter()
        .map(|link| Link {
            rel: link.attr_or_empty(&["rel"]),
            href: link.attr_or_empty(&["href"]),
            media_type: link.attr_or_empty(&["type"]),
        })
        .collect();

    ObjectStructure {
        name: root.attr_or_empty(&["adtcore:name", "name"]),
        object_type: root.attr_or_empty(&["adtcore:type", "type"]),
        description: root.attr_or_empty(&["adtcore:description", "description"]),
        version: root.attr_or_empty(&["adtcore:version", "version"]),
        created_by: root.attr_or_empty(&["adtcore:createdBy"]),
        changed_by: root.attr_or_empty(&["adtcore:changedBy"]),
        master_language: root.attr_or_empty(&["adtcore:masterLanguage"]),
        package_name,
        includes,
        function_modules,
        links,
    }
}

// ============================================================================
// ABAP documentation
// ============================================================================

lazy_static! {
    static ref HTML_BREAK: Regex = Regex::new(r"(?i)<br\s*/?>").expect("valid break pattern");
    static ref HTML_PARAGRAPH_END: Regex = Regex::new(r"(?i)</p>").expect("valid paragraph pattern");
    static ref HTML_LINE_END: Regex =
        Regex::new(r"(?i)</(div|li|tr|h[1-6])>").expect("valid line end pattern");
    static ref HTML_LIST_ITEM: Regex = Regex::new(r"(?i)<li(\s[^>]*)?>").expect("valid list pattern");
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").expect("valid tag pattern");
    static ref HORIZONTAL_SPACE: Regex = Regex::new(r"[ \t]+").expect("valid space pattern");
    static ref PADDED_NEWLINE: Regex = Regex::new(r" ?\n ?").expect("valid newline pattern");
    static ref BLANK_LINES: Regex = Regex::new(r"\n{3,}").expect("valid blank lines pattern");
}

/// Plain text from an HTML fragment: block ends become newlines, tags are dropped.
pub fn strip_html(html: &str) -> String {
    let text = HTML_BREAK.replace_all(html, "\n");
    let text = HTML_PARAGRAPH_END.replace_all(&text, "\n\n");
    let text = HTML_LINE_END.replace_all(&text, "\n");
    let text = HTML_LIST_ITEM.replace_all(&text, "\u{2022} ");
    let text = HTML_TAG.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = PADDED_NEWLINE.replace_all(&text, "\n");
    BLANK_LINES.replace_all(&text, "\n\n").trim().to_string()
}

fn block_text(element: &XmlElement, out: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Text(text) if !text.trim().is_empty() => {
                out.push_str(text.trim());
                out.push(' ');
            }
            XmlNode::Text(_) => {}
            XmlNode::Element(child) => {
                let tag = child.local_name().to_lowercase();
                let opens_line = matches!(tag.as_str(), "p" | "br" | "div" | "li" | "tr");
                let closes_line = matches!(tag.as_str(), "p" | "div" | "li");
                if opens_line {
                    out.push('\n');
                }
                block_text(child, out);
                if closes_line {
                    out.push('\n');
                }
            }
        }
    }
}

/// Documentation text from an XML, HTML or plain-text docu response.
///
/// XML responses contribute their `documentation` block followed by every
/// `shortText` and `longText`. Anything else, well-formed XHTML included,
/// is read as HTML.
pub fn parse_abap_docu(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if !trimmed.starts_with('<') {
        return strip_html(trimmed);
    }

    let root = match parse_document(trimmed) {
        Ok(root) => root,
        Err(e) => {
            debug!("Docu response is not XML ({}), reading it as HTML", e);
            return strip_html(trimmed);
        }
    };

    let mut out = String::new();
    if let Some(documentation) = root.find_all("documentation").first() {
        block_text(documentation, &mut out);
    }
    for short_text in root.find_all("shortText") {
        let text = short_text.text();
        if !text.trim().is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(text.trim());
        }
    }
    for long_text in root.find_all("longText") {
        let text = long_text.text();
        if !text.trim().is_empty() {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(text.trim());
        }
    }

    if out.trim().is_empty() {
        return strip_html(trimmed);
    }
    out.trim().to_string()
}
