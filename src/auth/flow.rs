//! SMART-on-FHIR authorization-code flow.
//!
//! [`AuthorizationFlow::authorize`] builds the browser redirect URL and parks
//! the flow state under a random nonce; [`AuthorizationFlow::complete_auth`]
//! consumes the redirect, exchanges the code at the token endpoint, and yields
//! a refresh-capable [`Session`].

use std::collections::HashMap;

use rand::Rng;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};

use crate::config::{CONNECT_TIMEOUT, REQUEST_TIMEOUT, STATE_ALPHABET, STATE_LENGTH};
use crate::error::{Error, Result};
use crate::metadata::security_endpoints;
use crate::models::auth::{Session, TokenErrorResponse, TokenExchangeResponse};

use super::basic_credential;
use super::pending::{PendingAuthorization, PendingStore};

/// Parameters for starting an authorization flow.
#[derive(Debug, Clone)]
pub struct AuthorizeOptions {
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret (confidential clients only).
    pub client_secret: Option<String>,
    /// Redirect URI the authorization server will call back.
    pub redirect_uri: String,
    /// Requested scope.
    pub scope: String,
    /// FHIR server base URL (the `iss`).
    pub iss: String,
}

impl AuthorizeOptions {
    /// Create options for a public client.
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
        iss: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
            iss: iss.into(),
        }
    }

    /// Attach a client secret for confidential-client token exchange.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }
}

/// Manages authorization-code flows against SMART-enabled FHIR servers.
pub struct AuthorizationFlow {
    client: reqwest::Client,
    pending: PendingStore,
}

impl AuthorizationFlow {
    /// Create a flow manager with a default HTTP client.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            pending: PendingStore::new(),
        }
    }

    /// Create a flow manager with a custom reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            pending: PendingStore::new(),
        }
    }

    /// The store of in-flight flows.
    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    /// Start an authorization flow.
    ///
    /// Resolves the server's authorization endpoint, stores the flow state
    /// under a fresh nonce, and returns the URL to send the browser to. The
    /// client secret is kept in the pending record and never appears in the
    /// URL.
    pub async fn authorize(&self, opts: AuthorizeOptions) -> Result<String> {
        let endpoints = security_endpoints(&self.client, &opts.iss).await?;
        let authorize_uri = endpoints.authorize_uri()?;

        let state = generate_state();
        let url = format!(
            "{}?response_type=code&client_id={}&scope={}&redirect_uri={}&aud={}&state={}",
            authorize_uri,
            urlencoding::encode(&opts.client_id),
            urlencoding::encode(&opts.scope),
            urlencoding::encode(&opts.redirect_uri),
            urlencoding::encode(&opts.iss),
            urlencoding::encode(&state),
        );

        debug!(state = state.as_str(), iss = opts.iss.as_str(), "Authorization flow started");

        self.pending
            .insert(PendingAuthorization {
                state,
                client_id: opts.client_id,
                client_secret: opts.client_secret,
                redirect_uri: opts.redirect_uri,
                scope: opts.scope,
                iss: opts.iss,
            })
            .await;

        Ok(url)
    }

    /// Complete an authorization flow from the redirected URI.
    ///
    /// `redirected` is the full URI (or path+query) the authorization server
    /// invoked. `unsafe_url_encode` forces client credentials into the form
    /// body for servers that reject HTTP Basic authentication.
    ///
    /// The pending record is consumed only after a successful exchange, so a
    /// failed exchange leaves the flow completable on retry. The returned
    /// session has no access token yet; the first authenticated request
    /// performs the initial refresh.
    pub async fn complete_auth(
        &self,
        redirected: &str,
        unsafe_url_encode: bool,
    ) -> Result<Session> {
        let query = redirected.splitn(2, '?').nth(1).unwrap_or("");
        let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();

        if let Some(error) = params.get("error") {
            warn!(error = error.as_str(), "Authorization server returned an error");
            return Err(Error::AuthorizationDenied {
                error: error.clone(),
                description: params.get("error_description").cloned(),
            });
        }

        let code = params.get("code").ok_or(Error::MissingCode)?;
        let state = params.get("state").ok_or(Error::MissingState)?;

        let pending = self.pending.get(state).await.ok_or(Error::UnknownState)?;

        let endpoints = security_endpoints(&self.client, &pending.iss).await?;
        let token_uri = endpoints.token_uri()?;

        let basic = pending
            .client_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .map(|secret| basic_credential(&pending.client_id, secret));

        // Redirect URI comes from the stored record, never from the redirect.
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", pending.redirect_uri.as_str()),
        ];
        if unsafe_url_encode {
            if let Some(secret) = pending.client_secret.as_deref() {
                form.push(("client_secret", secret));
            }
        }
        if basic.is_none() || unsafe_url_encode {
            form.push(("client_id", &pending.client_id));
        }

        debug!(state = state.as_str(), "Exchanging authorization code");

        let mut request = self.client.post(token_uri).form(&form);
        if let Some(credential) = &basic {
            request = request.header(AUTHORIZATION, format!("Basic {}", credential));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<TokenErrorResponse>(&body) {
                warn!(
                    error = error.error.as_str(),
                    description = error.error_description.as_deref(),
                    "Token exchange failed"
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

        let token: TokenExchangeResponse = serde_json::from_str(&body)?;

        // Single use: consume only after a successful exchange.
        self.pending.remove(state).await;

        debug!(iss = pending.iss.as_str(), "Authorization flow completed");

        Ok(Session {
            base_url: pending.iss,
            client_id: Some(pending.client_id),
            client_secret: pending.client_secret,
            scope: token.scope,
            patient_id: token.patient,
            access_token: None,
            refresh_token: token.refresh_token,
            expires_at: None,
        })
    }
}

impl Default for AuthorizationFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a random state nonce.
///
/// Collision-resistant rather than cryptographic: 16 characters drawn from
/// an alphanumeric+symbol alphabet.
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    (0..STATE_LENGTH)
        .map(|_| STATE_ALPHABET[rng.gen_range(0..STATE_ALPHABET.len())] as char)
        .collect()
}
