//! Argument helpers shared by the object-addressed tools.
//!
//! Objects are named by `objectType` + `objectName`; a raw ADT URL
//! (`objectUrl`, `objectSourceUrl` or `url`) is accepted as a fallback.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::adt::object_kind::{
    ensure_source_url, to_object_url, UnknownObjectKind, TYPE_CODES, TYPE_DESCRIPTION,
};
use crate::adt::ObjectKind;
use crate::mcp::protocol::McpError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectArgs {
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub object_name: Option<String>,
    #[serde(default)]
    pub object_url: Option<String>,
    #[serde(default)]
    pub object_source_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl ObjectArgs {
    fn kind_and_name(&self) -> Result<Option<(ObjectKind, &str)>, McpError> {
        match (non_empty(&self.object_type), non_empty(&self.object_name)) {
            (Some(object_type), Some(name)) => {
                let kind: ObjectKind = object_type
                    .parse()
                    .map_err(|e: UnknownObjectKind| McpError::InvalidParams(e.to_string()))?;
                Ok(Some((kind, name)))
            }
            _ => Ok(None),
        }
    }

    fn raw_url(&self) -> Option<&str> {
        non_empty(&self.object_url)
            .or_else(|| non_empty(&self.object_source_url))
            .or_else(|| non_empty(&self.url))
    }

    fn missing() -> McpError {
        McpError::InvalidParams(
            "objectType and objectName (or objectUrl) are required".to_string(),
        )
    }

    pub fn object_url(&self) -> Result<String, McpError> {
        if let Some((kind, name)) = self.kind_and_name()? {
            return Ok(kind.object_url(name));
        }
        self.raw_url().map(to_object_url).ok_or_else(Self::missing)
    }

    pub fn source_url(&self) -> Result<String, McpError> {
        if let Some((kind, name)) = self.kind_and_name()? {
            return kind.source_url(name).ok_or_else(|| {
                McpError::InvalidParams(format!(
                    "{} objects have no main source; pass the function module objectUrl instead",
                    kind
                ))
            });
        }
        self.raw_url().map(ensure_source_url).ok_or_else(Self::missing)
    }
}

pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Required string argument, trimmed.
pub fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, McpError> {
    non_empty(value).ok_or_else(|| McpError::InvalidParams(format!("{} is required", name)))
}

/// Input schema with the object-addressing properties plus `extra`.
pub fn object_schema(extra: Value, required: &[&str]) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "objectType".to_string(),
        json!({
            "type": "string",
            "description": TYPE_DESCRIPTION,
            "enum": TYPE_CODES
        }),
    );
    properties.insert(
        "objectName".to_string(),
        json!({
            "type": "string",
            "description": "Object name, e.g. ZCL_MY_CLASS. Required with objectType unless objectUrl is given"
        }),
    );
    properties.insert(
        "objectUrl".to_string(),
        json!({
            "type": "string",
            "description": "ADT URL of the object, used when objectType/objectName are omitted"
        }),
    );
    if let Value::Object(extra) = extra {
        properties.extend(extra);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}
