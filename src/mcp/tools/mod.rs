//! MCP Tools
//!
//! Tool implementations for the ADT repository, grouped by concern.

pub mod args;
pub mod data;
pub mod docu;
pub mod locking;
pub mod quality;
pub mod repository;
pub mod source;

use super::registry::McpRegistry;

/// Register all tools with the registry
pub fn register_all_tools(registry: &mut McpRegistry) {
    repository::register_tools(registry);
    source::register_tools(registry);
    locking::register_tools(registry);
    quality::register_tools(registry);
    data::register_tools(registry);
    docu::register_tools(registry);
}
