//! In-memory store for in-flight authorization flows.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crate::config::PENDING_FLOW_TTL;

/// One in-flight authorization-code request.
///
/// Holds everything needed to finish the token exchange after the redirect,
/// including the client secret, which never appears in the outgoing URL.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    /// Random state nonce this record is keyed by.
    pub state: String,
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret (confidential clients only).
    pub client_secret: Option<String>,
    /// Redirect URI registered for the flow; reused in the token exchange to
    /// prevent redirect-URI substitution.
    pub redirect_uri: String,
    /// Requested scope.
    pub scope: String,
    /// Target FHIR server URL (the `iss`).
    pub iss: String,
}

struct PendingEntry {
    auth: PendingAuthorization,
    created_at: Instant,
}

/// TTL-evicting map of pending authorizations keyed by state nonce.
///
/// Distinct nonces never contend; expired entries are purged on every insert
/// so abandoned flows do not accumulate for the process lifetime.
pub struct PendingStore {
    entries: RwLock<HashMap<String, PendingEntry>>,
    ttl: Duration,
}

impl PendingStore {
    /// Create a store with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(PENDING_FLOW_TTL)
    }

    /// Create a store with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Store a pending authorization under its state nonce.
    pub async fn insert(&self, auth: PendingAuthorization) {
        let mut entries = self.entries.write().await;
        entries.retain(|state, entry| {
            let live = entry.created_at.elapsed() < self.ttl;
            if !live {
                debug!(state = state.as_str(), "Evicting expired pending authorization");
            }
            live
        });
        entries.insert(
            auth.state.clone(),
            PendingEntry {
                auth,
                created_at: Instant::now(),
            },
        );
    }

    /// Fetch a live pending authorization without consuming it.
    pub async fn get(&self, state: &str) -> Option<PendingAuthorization> {
        let entries = self.entries.read().await;
        entries
            .get(state)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.auth.clone())
    }

    /// Consume a pending authorization. Each record is removable once.
    pub async fn remove(&self, state: &str) -> Option<PendingAuthorization> {
        self.entries
            .write()
            .await
            .remove(state)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.auth)
    }

    /// Number of stored flows, including any not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no flows.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for PendingStore {
    fn default() -> Self {
        Self::new()
    }
}
