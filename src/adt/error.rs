use thiserror::Error;

/// Errors raised while talking to the ADT backend.
#[derive(Debug, Error)]
pub enum AdtError {
    #[error("Connection error: {0}")]
    Connectivity(String),

    #[error("Authentication failed (status {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("HTTP {status} {method} {uri} -- {body}")]
    Http {
        status: u16,
        method: String,
        uri: String,
        body: String,
    },

    #[error("Failed to acquire lock on {object_url}. Response: {body}")]
    Lock { object_url: String, body: String },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl AdtError {
    /// The object is locked by another session (HTTP 423).
    pub fn is_locked(&self) -> bool {
        matches!(self, AdtError::Http { status: 423, .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AdtError::Auth { status, .. } | AdtError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for AdtError {
    fn from(err: reqwest::Error) -> Self {
        AdtError::Connectivity(err.to_string())
    }
}
