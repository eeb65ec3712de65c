//! Repository object kinds and their ADT URLs.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const SOURCE_MAIN: &str = "/source/main";

/// Codes accepted in tool schemas, aliases included.
pub const TYPE_CODES: &[&str] = &[
    "CLAS", "INTF", "PROG", "TABL", "STRU", "DDLS", "CDS", "DTEL", "DOMA", "SRVD", "DDLX", "BDEF",
    "FUGR",
];

pub const TYPE_DESCRIPTION: &str = "Object type: CLAS (class), INTF (interface), PROG (program), \
     TABL (table), STRU (structure), DDLS/CDS (CDS view), DTEL (data element), DOMA (domain), \
     SRVD (service definition), DDLX (metadata extension), BDEF (behavior definition), \
     FUGR (function group)";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported object type: {0}")]
pub struct UnknownObjectKind(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Class,
    Interface,
    Program,
    Table,
    Structure,
    CdsView,
    DataElement,
    Domain,
    ServiceDefinition,
    MetadataExtension,
    BehaviorDefinition,
    FunctionGroup,
}

/// What the backend needs to create a new object of a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationSpec {
    pub adt_type: &'static str,
    pub content_type: &'static str,
    pub root_element: &'static str,
    pub namespace: &'static str,
}

impl ObjectKind {
    pub fn code(&self) -> &'static str {
        match self {
            ObjectKind::Class => "CLAS",
            ObjectKind::Interface => "INTF",
            ObjectKind::Program => "PROG",
            ObjectKind::Table => "TABL",
            ObjectKind::Structure => "STRU",
            ObjectKind::CdsView => "DDLS",
            ObjectKind::DataElement => "DTEL",
            ObjectKind::Domain => "DOMA",
            ObjectKind::ServiceDefinition => "SRVD",
            ObjectKind::MetadataExtension => "DDLX",
            ObjectKind::BehaviorDefinition => "BDEF",
            ObjectKind::FunctionGroup => "FUGR",
        }
    }

    /// Collection URL; object URLs are `<collection>/<name>`.
    pub fn collection_url(&self) -> &'static str {
        match self {
            ObjectKind::Class => "/sap/bc/adt/oo/classes",
            ObjectKind::Interface => "/sap/bc/adt/oo/interfaces",
            ObjectKind::Program => "/sap/bc/adt/programs/programs",
            ObjectKind::Table => "/sap/bc/adt/ddic/tables",
            ObjectKind::Structure => "/sap/bc/adt/ddic/structures",
            ObjectKind::CdsView => "/sap/bc/adt/ddic/ddl/sources",
            ObjectKind::DataElement => "/sap/bc/adt/ddic/dataelements",
            ObjectKind::Domain => "/sap/bc/adt/ddic/domains",
            ObjectKind::ServiceDefinition => "/sap/bc/adt/ddic/srvd/sources",
            ObjectKind::MetadataExtension => "/sap/bc/adt/ddic/ddlx/sources",
            ObjectKind::BehaviorDefinition => "/sap/bc/adt/bopf/bdef/sources",
            ObjectKind::FunctionGroup => "/sap/bc/adt/functions/groups",
        }
    }

    pub fn creation_spec(&self) -> Option<CreationSpec> {
        match self {
            ObjectKind::Program => Some(CreationSpec {
                adt_type: "PROG/P",
                content_type: "application/vnd.sap.adt.programs.programs.v2+xml",
                root_element: "program:abapProgram",
                namespace: "xmlns:program=\"http://www.sap.com/adt/programs/programs\"",
            }),
            ObjectKind::Class => Some(CreationSpec {
                adt_type: "CLAS/OC",
                content_type: "application/vnd.sap.adt.oo.classes.v4+xml",
                root_element: "class:abapClass",
                namespace: "xmlns:class=\"http://www.sap.com/adt/oo/classes\"",
            }),
            ObjectKind::Interface => Some(CreationSpec {
                adt_type: "INTF/OI",
                content_type: "application/vnd.sap.adt.oo.interfaces.v5+xml",
                root_element: "intf:abapInterface",
                namespace: "xmlns:intf=\"http://www.sap.com/adt/oo/interfaces\"",
            }),
            ObjectKind::FunctionGroup => Some(CreationSpec {
                adt_type: "FUGR/F",
                content_type: "application/vnd.sap.adt.functions.groups.v3+xml",
                root_element: "group:abapFunctionGroup",
                namespace: "xmlns:group=\"http://www.sap.com/adt/functions/groups\"",
            }),
            _ => None,
        }
    }

    pub fn object_url(&self, name: &str) -> String {
        format!("{}/{}", self.collection_url(), name.to_lowercase())
    }

    /// `None` for function groups, whose source lives in their includes and modules.
    pub fn source_url(&self, name: &str) -> Option<String> {
        match self {
            ObjectKind::FunctionGroup => None,
            _ => Some(format!("{}{}", self.object_url(name), SOURCE_MAIN)),
        }
    }
}

impl FromStr for ObjectKind {
    type Err = UnknownObjectKind;

    /// Accepts short codes, long aliases and the `CODE/SUBTYPE` ADT form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let code = upper.split('/').next().unwrap_or_default();
        match code {
            "CLAS" | "CLASS" => Ok(ObjectKind::Class),
            "INTF" | "INTERFACE" => Ok(ObjectKind::Interface),
            "PROG" | "PROGRAM" => Ok(ObjectKind::Program),
            "TABL" | "TABLE" => Ok(ObjectKind::Table),
            "STRU" | "STRUCTURE" => Ok(ObjectKind::Structure),
            "DDLS" | "CDS" => Ok(ObjectKind::CdsView),
            "DTEL" | "DATAELEMENT" => Ok(ObjectKind::DataElement),
            "DOMA" | "DOMAIN" => Ok(ObjectKind::Domain),
            "SRVD" => Ok(ObjectKind::ServiceDefinition),
            "DDLX" => Ok(ObjectKind::MetadataExtension),
            "BDEF" => Ok(ObjectKind::BehaviorDefinition),
            "FUGR" => Ok(ObjectKind::FunctionGroup),
            _ => Err(UnknownObjectKind(s.to_string())),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

fn split_query(url: &str) -> (&str, &str) {
    match url.find('?') {
        Some(idx) => url.split_at(idx),
        None => (url, ""),
    }
}

/// Strips everything from `/source/` onward, keeping any query string.
pub fn to_object_url(url: &str) -> String {
    let (path, query) = split_query(url);
    match path.find("/source/") {
        Some(idx) => format!("{}{}", &path[..idx], query),
        None => url.to_string(),
    }
}

/// Appends `/source/main` to bare program, class, interface and function module URLs.
pub fn ensure_source_url(url: &str) -> String {
    let (path, query) = split_query(url);
    if path.is_empty() || path.contains("/source/") {
        return url.to_string();
    }

    let parent = match path.rsplit_once('/') {
        Some((parent, name)) if !name.is_empty() => parent,
        _ => return url.to_string(),
    };

    let has_source = ["/programs/programs", "/oo/classes", "/oo/interfaces", "/fmodules"]
        .iter()
        .any(|suffix| parent.ends_with(suffix));

    if has_source {
        format!("{}{}{}", path, SOURCE_MAIN, query)
    } else {
        url.to_string()
    }
}

/// Last non-empty path segment, upper-cased.
pub fn object_name_from_url(url: &str) -> String {
    let (path, _) = split_query(url);
    path.split('/')
        .rev()
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

pub fn is_function_module_url(url: &str) -> bool {
    url.to_lowercase().contains("/fmodules/")
}

/// Drops the generated `*"` signature comment lines from function module source.
pub fn sanitize_function_module_source(source: &str) -> String {
    source
        .lines()
        .filter(|line| !line.trim_start().starts_with("*\""))
        .collect::<Vec<_>>()
        .join("\n")
}
