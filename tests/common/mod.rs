//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer};
//!
//! #[tokio::test]
//! async fn test_health() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.health().await;
//!     assert!(response.status().is_success());
//! }
//! ```

#![allow(dead_code)]

mod client;
mod constants;
mod mock_backend;
mod server;

// Public API - this is what tests import
pub use client::{TestClient, SESSION_HEADER};
pub use constants::*;
pub use mock_backend::{BackendCall, MockBackend, RecordedRequest};
pub use server::TestServer;
