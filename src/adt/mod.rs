//! ADT (ABAP Development Tools) REST client
//!
//! Stateful session against the repository server: basic auth, cookie
//! session, CSRF token handling and the lock/write/activate/unlock sequence.

pub mod client;
pub mod error;
pub mod lock;
pub mod object_kind;
pub mod xml;

pub use client::{AdtClient, AdtClientConfig, AdtRequest, AdtResponse};
pub use error::AdtError;
pub use lock::{LockHandle, LockRetryPolicy, SourceWrite, WriteOutcome};
pub use object_kind::ObjectKind;
