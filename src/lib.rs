pub mod adt;
pub mod config;
pub mod mcp;
pub mod server;
