//! Lock, write, activate and unlock sequencing.
//!
//! A write moves through `Unlocked -> Locked -> Written -> Activated |
//! ActivationFailed -> Unlocked`. Every acquired handle gets exactly one
//! unlock attempt; HTTP 423 on lock or write restarts the whole sequence up
//! to [`LockRetryPolicy::max_attempts`].

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tracing::{debug, info, warn};

use super::client::{AdtClient, AdtRequest, AdtResponse};
use super::error::AdtError;
use super::object_kind::{object_name_from_url, to_object_url};
use super::xml::{self, ActivationResult};

pub const ACTIVATION_PATH: &str = "/sap/bc/adt/activation?method=activate&preauditRequested=true";

const LOCK_ACCEPT: &str = "application/vnd.sap.as+xml;charset=UTF-8;dataname=com.sap.adt.lock.result;q=0.8, \
     application/vnd.sap.as+xml;charset=UTF-8;dataname=com.sap.adt.lock.result2;q=0.9";
const ACTIVATION_ACCEPT: &str = "application/xml,application/vnd.sap.adt.inactivectsobjects.v1+xml;q=0.9";

/// Bounded retry for objects locked by another session.
#[derive(Debug, Clone, PartialEq)]
pub struct LockRetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Opaque handle returned by the backend for a locked object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle(String);

impl LockHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LockHandle {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

/// Stateful LOCK request. A response without a handle is a [`AdtError::Lock`].
pub async fn lock(client: &AdtClient, object_url: &str) -> Result<LockHandle, AdtError> {
    let response = client
        .request(
            AdtRequest::new(
                Method::POST,
                format!("{}?_action=LOCK&accessMode=MODIFY", object_url),
            )
            .body("", "application/*")
            .accept(LOCK_ACCEPT)
            .stateful(),
        )
        .await?;

    match xml::extract_lock_handle(&response.body) {
        Some(handle) => {
            debug!("Locked {}", object_url);
            Ok(LockHandle(handle))
        }
        None => Err(AdtError::Lock {
            object_url: object_url.to_string(),
            body: response.body,
        }),
    }
}

pub async fn unlock(
    client: &AdtClient,
    object_url: &str,
    handle: &LockHandle,
) -> Result<AdtResponse, AdtError> {
    client
        .request(
            AdtRequest::new(
                Method::POST,
                format!(
                    "{}?_action=UNLOCK&lockHandle={}",
                    object_url,
                    urlencoding::encode(handle.as_str())
                ),
            )
            .body("", "application/*")
            .accept("application/*")
            .stateful(),
        )
        .await
}

pub async fn activate(client: &AdtClient, object_url: &str) -> Result<ActivationResult, AdtError> {
    let body = format!(
        "<adtcore:objectReferences xmlns:adtcore=\"http://www.sap.com/adt/core\">\
         <adtcore:objectReference adtcore:uri=\"{}\" adtcore:name=\"{}\"/>\
         </adtcore:objectReferences>",
        xml::escape_xml(object_url),
        xml::escape_xml(&object_name_from_url(object_url))
    );

    let response = client
        .post(ACTIVATION_PATH, &body, "application/xml", ACTIVATION_ACCEPT)
        .await?;
    Ok(xml::parse_activation_result(&response.body))
}

/// Source text to store under a lock.
#[derive(Debug, Clone)]
pub struct SourceWrite {
    pub source_url: String,
    pub source: String,
    pub transport: Option<String>,
}

impl SourceWrite {
    pub fn object_url(&self) -> String {
        to_object_url(&self.source_url)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActivationOutcome {
    Activated,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub status_code: u16,
    pub activation: ActivationOutcome,
}

impl WriteOutcome {
    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::json!({
            "status": "success",
            "statusCode": self.status_code,
            "activated": self.activation == ActivationOutcome::Activated,
        });
        if let ActivationOutcome::Failed(msg) = &self.activation {
            value["activationError"] = serde_json::Value::String(msg.clone());
        }
        value
    }
}

/// An object locked by this session. Consumed by [`LockedObject::release`].
struct LockedObject<'a> {
    client: &'a AdtClient,
    object_url: String,
    handle: LockHandle,
}

impl<'a> LockedObject<'a> {
    async fn acquire(client: &'a AdtClient, object_url: String) -> Result<Self, AdtError> {
        let handle = lock(client, &object_url).await?;
        Ok(Self {
            client,
            object_url,
            handle,
        })
    }

    async fn write(&self, write: &SourceWrite) -> Result<u16, AdtError> {
        let mut path = format!(
            "{}?lockHandle={}",
            write.source_url,
            urlencoding::encode(self.handle.as_str())
        );
        if let Some(transport) = write.transport.as_deref().filter(|t| !t.is_empty()) {
            path.push_str(&format!("&corrNr={}", urlencoding::encode(transport)));
        }

        let response = self
            .client
            .request(
                AdtRequest::new(Method::PUT, path)
                    .body(write.source.as_str(), "text/plain; charset=utf-8")
                    .stateful(),
            )
            .await?;
        Ok(response.status)
    }

    async fn activate(&self) -> ActivationOutcome {
        match activate(self.client, &self.object_url).await {
            Ok(result) if result.success => ActivationOutcome::Activated,
            Ok(result) if result.messages.is_empty() => {
                ActivationOutcome::Failed("Activation reported errors".to_string())
            }
            Ok(result) => ActivationOutcome::Failed(result.messages.join("; ")),
            Err(e) => ActivationOutcome::Failed(e.to_string()),
        }
    }

    /// Best-effort unlock; failures are logged, never returned.
    async fn release(self) {
        if let Err(e) = unlock(self.client, &self.object_url, &self.handle).await {
            warn!("Failed to unlock {}: {}", self.object_url, e);
        } else {
            debug!("Unlocked {}", self.object_url);
        }
    }
}

async fn write_once(client: &AdtClient, write: &SourceWrite) -> Result<WriteOutcome, AdtError> {
    let locked = LockedObject::acquire(client, write.object_url()).await?;

    let result = match locked.write(write).await {
        Ok(status_code) => Ok(WriteOutcome {
            status_code,
            activation: locked.activate().await,
        }),
        Err(e) => Err(e),
    };

    locked.release().await;
    result
}

/// Runs the full write sequence, retrying on HTTP 423.
pub async fn write_source(
    client: &AdtClient,
    write: &SourceWrite,
    policy: &LockRetryPolicy,
) -> Result<WriteOutcome, AdtError> {
    let mut attempt = 1;
    loop {
        match write_once(client, write).await {
            Err(e) if e.is_locked() && attempt < policy.max_attempts => {
                warn!(
                    "{} is locked (attempt {}/{}), retrying in {:?}",
                    write.source_url, attempt, policy.max_attempts, policy.backoff
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Ok(outcome) => {
                info!(
                    "Wrote {} (status {}, activation {:?})",
                    write.source_url, outcome.status_code, outcome.activation
                );
                return Ok(outcome);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Runs [`write_source`] on its own task so a dropped caller cannot skip
/// the unlock.
pub async fn write_source_detached(
    client: Arc<AdtClient>,
    write: SourceWrite,
    policy: LockRetryPolicy,
) -> Result<WriteOutcome, AdtError> {
    tokio::spawn(async move { write_source(&client, &write, &policy).await })
        .await
        .map_err(|e| AdtError::Protocol(format!("write task failed: {}", e)))?
}
