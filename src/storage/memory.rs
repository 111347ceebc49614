//! In-memory session storage for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::TokenStorage;
use crate::error::Result;
use crate::models::auth::Session;

/// In-memory session storage, primarily for testing.
pub struct MemoryTokenStorage {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemoryTokenStorage {
    /// Create a new empty in-memory storage.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryTokenStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn load(&self, server: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(server).cloned())
    }

    async fn save(&self, server: &str, session: &Session) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(server.to_string(), session.clone());
        Ok(())
    }

    async fn remove(&self, server: &str) -> Result<()> {
        self.sessions.write().await.remove(server);
        Ok(())
    }

    async fn exists(&self, server: &str) -> Result<bool> {
        Ok(self.sessions.read().await.contains_key(server))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryTokenStorage::new();
        let server = "https://fhir.example/r4";

        assert!(storage.load(server).await.unwrap().is_none());
        assert!(!storage.exists(server).await.unwrap());

        let mut session = Session::new(server);
        session.refresh_token = Some("R".into());
        storage.save(server, &session).await.unwrap();

        assert!(storage.exists(server).await.unwrap());
        let loaded = storage.load(server).await.unwrap().unwrap();
        assert_eq!(loaded.refresh_token.as_deref(), Some("R"));

        storage.remove(server).await.unwrap();
        assert!(!storage.exists(server).await.unwrap());
    }
}
