//! Protocol sessions, identified by the `Mcp-Session-Id` header.

use std::collections::HashSet;

use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashSet<String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints and records a new session id.
    pub async fn create(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.sessions.write().await.insert(id.clone());
        id
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains(id)
    }

    /// Returns false if the id was unknown.
    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id)
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
