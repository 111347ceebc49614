//! Session token lifecycle manager.
//!
//! Handles access-token refresh, expiry tracking, and thread-safe access to
//! the session state.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{CONNECT_TIMEOUT, DEFAULT_SCOPE, REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use crate::metadata::security_endpoints;
use crate::models::auth::{RefreshResponse, Session, TokenErrorResponse};
use crate::storage::TokenStorage;

use super::basic_credential;

/// Manages one session's token lifecycle.
///
/// Thread-safe: the session lives behind an `RwLock` so the manager can be
/// shared across tasks. Refresh is single-flight: concurrent callers racing
/// near expiry serialize on the write lock, and a double-check after
/// acquisition lets all but the first reuse the fresh token.
pub struct SessionManager {
    session: RwLock<Session>,
    client: reqwest::Client,
    storage: Option<Arc<dyn TokenStorage>>,
}

impl SessionManager {
    /// Create a manager for a session.
    pub fn new(session: Session) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            session: RwLock::new(session),
            client,
            storage: None,
        }
    }

    /// Set the storage backend for session persistence.
    pub fn with_storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the HTTP client (useful for testing or custom TLS config).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Get a valid access token, refreshing first when needed.
    ///
    /// This is the pre-flight check every authenticated request goes through:
    /// a token within the expiry safety margin (or never obtained) triggers
    /// exactly one refresh for the calling task.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let session = self.session.read().await;
            if !session.needs_refresh() {
                if let Some(token) = &session.access_token {
                    return Ok(token.clone());
                }
            }
        }

        self.refresh().await?;

        let session = self.session.read().await;
        session
            .access_token
            .clone()
            .ok_or(Error::NotAuthenticated)
    }

    /// Snapshot of the current session state.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// The session's FHIR server base URL.
    pub async fn base_url(&self) -> String {
        self.session.read().await.base_url.clone()
    }

    /// The current patient context, if any.
    pub async fn patient_id(&self) -> Option<String> {
        self.session.read().await.patient_id.clone()
    }

    /// Force a refresh regardless of expiry (e.g. after a 401 response).
    pub async fn force_refresh(&self) -> Result<()> {
        info!("Force refresh requested");
        self.refresh_inner(true).await
    }

    /// Refresh the access token via the server's token endpoint.
    pub async fn refresh(&self) -> Result<()> {
        self.refresh_inner(false).await
    }

    async fn refresh_inner(&self, force: bool) -> Result<()> {
        let mut session = self.session.write().await;

        // Another task may have refreshed while we waited for the lock.
        if !force && !session.needs_refresh() && session.access_token.is_some() {
            return Ok(());
        }

        let client_id = session
            .client_id
            .as_deref()
            .ok_or_else(|| Error::MissingCredential("client_id".into()))?;
        let client_secret = session
            .client_secret
            .as_deref()
            .ok_or_else(|| Error::MissingCredential("client_secret".into()))?;
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or_else(|| Error::MissingCredential("refresh_token".into()))?;

        let endpoints = security_endpoints(&self.client, &session.base_url).await?;
        let token_uri = endpoints.token_uri()?;

        let scope = session.scope.as_deref().unwrap_or(DEFAULT_SCOPE);
        let credential = basic_credential(client_id, client_secret);

        debug!(base_url = session.base_url.as_str(), "Refreshing access token");

        let response = self
            .client
            .post(token_uri)
            .header(AUTHORIZATION, format!("Basic {}", credential))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("scope", scope),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<TokenErrorResponse>(&body) {
                warn!(
                    error = error.error.as_str(),
                    description = error.error_description.as_deref(),
                    "Token refresh failed"
                );
                return Err(Error::TokenExchange {
                    status: status.as_u16(),
                    message: error.error_description.unwrap_or(error.error),
                });
            }
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                message: body,
            });
        }

        let token: RefreshResponse = serde_json::from_str(&body)?;

        session.set_access_token(token.access_token, token.expires_in);
        if let Some(new_refresh) = token.refresh_token {
            if !new_refresh.is_empty() {
                session.refresh_token = Some(new_refresh);
            }
        }
        if let Some(patient) = token.patient {
            session.patient_id = Some(patient);
        }

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save(&session.base_url, &session).await {
                warn!("Failed to persist session: {}", e);
            }
        }

        info!("Token refreshed successfully");
        Ok(())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("has_storage", &self.storage.is_some())
            .finish()
    }
}
