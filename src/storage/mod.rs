//! Session storage backends.
//!
//! Provides the [`TokenStorage`] trait and implementations:
//! - [`FileTokenStorage`] - JSON file with 0600 permissions
//! - [`MemoryTokenStorage`] - In-memory (testing)

mod file;
mod memory;

use async_trait::async_trait;

pub use file::FileTokenStorage;
pub use memory::MemoryTokenStorage;

use crate::error::Result;
use crate::models::auth::Session;

/// Trait for session storage backends.
///
/// All operations take a `server` parameter (the FHIR server base URL) so one
/// backend can hold sessions for multiple servers.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Load the stored session for a server.
    async fn load(&self, server: &str) -> Result<Option<Session>>;

    /// Save the session for a server.
    async fn save(&self, server: &str, session: &Session) -> Result<()>;

    /// Remove the stored session for a server.
    async fn remove(&self, server: &str) -> Result<()>;

    /// Check if a session exists for a server.
    async fn exists(&self, server: &str) -> Result<bool> {
        Ok(self.load(server).await?.is_some())
    }

    /// Name of this storage backend.
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Blanket impl for `Arc<T>`.
#[async_trait]
impl<T: TokenStorage + ?Sized> TokenStorage for std::sync::Arc<T> {
    async fn load(&self, server: &str) -> Result<Option<Session>> {
        (**self).load(server).await
    }
    async fn save(&self, server: &str, session: &Session) -> Result<()> {
        (**self).save(server, session).await
    }
    async fn remove(&self, server: &str) -> Result<()> {
        (**self).remove(server).await
    }
    async fn exists(&self, server: &str) -> Result<bool> {
        (**self).exists(server).await
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}
