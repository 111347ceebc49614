//! Main client entry point.

use std::sync::Arc;

use reqwest::Method;
use tracing::info;

use crate::auth::SessionManager;
use crate::error::{Error, Result};
use crate::metadata::{self, fhir_release};
use crate::models::auth::Session;
use crate::storage::TokenStorage;
use crate::transport::http::{FhirHttpClient, RequestOptions};

/// FHIR API client.
///
/// Wraps resource CRUD/search calls with SMART-on-FHIR token management:
/// every request refreshes the access token when it is missing or within the
/// expiry safety margin, then carries `Accept: application/fhir+json` and a
/// Bearer credential.
///
/// # Examples
///
/// ```rust,no_run
/// use fhir_smart::{FhirClient, RequestOptions};
///
/// # async fn example() -> fhir_smart::Result<()> {
/// let client = FhirClient::builder()
///     .base_url("https://fhir.example/r4")
///     .client_id("my-app")
///     .client_secret("s3cret")
///     .refresh_token("refresh-token")
///     .build()
///     .await?;
///
/// let patient = client.read("Patient/123", RequestOptions::new()).await?;
/// println!("{}", patient["name"]);
/// # Ok(())
/// # }
/// ```
pub struct FhirClient {
    auth: Arc<SessionManager>,
    http: Arc<FhirHttpClient>,
    metadata_client: reqwest::Client,
}

impl std::fmt::Debug for FhirClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhirClient").finish_non_exhaustive()
    }
}

impl FhirClient {
    /// Create a builder for configuring the client.
    pub fn builder() -> FhirClientBuilder {
        FhirClientBuilder::new()
    }

    /// Create a client from an existing session, typically the result of
    /// [`crate::AuthorizationFlow::complete_auth`].
    pub fn from_session(session: Session) -> Self {
        let auth = Arc::new(SessionManager::new(session));
        let http = Arc::new(FhirHttpClient::new(Arc::clone(&auth)));
        Self {
            auth,
            http,
            metadata_client: reqwest::Client::new(),
        }
    }

    /// Read a resource: GET `<base>/<path>`.
    pub async fn read(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        self.http.request(Method::GET, path, &[], options).await
    }

    /// Search resources: GET `<base>/<path>` with search parameters.
    ///
    /// Same verb as [`read`](Self::read); distinguished only by call-site
    /// semantics. Returns a Bundle-shaped document.
    pub async fn search(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        self.http.request(Method::GET, path, &[], options).await
    }

    /// Create a resource: POST `<base>/<path>`.
    pub async fn create(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        self.http.request(Method::POST, path, &[], options).await
    }

    /// Update a resource: PUT `<base>/<path>`.
    pub async fn update(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        self.http.request(Method::PUT, path, &[], options).await
    }

    /// Delete a resource: DELETE `<base>/<path>`.
    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        self.http.request(Method::DELETE, path, &[], options).await
    }

    /// A namespace for patient-scoped operations.
    ///
    /// Every request made through it carries a `patient=<id>` query parameter
    /// for the session's current patient context.
    pub async fn patient(&self) -> PatientContext<'_> {
        PatientContext {
            client: self,
            id: self.auth.patient_id().await,
        }
    }

    /// Get the FHIR version from the server's capability statement.
    pub async fn fhir_version(&self) -> Result<Option<String>> {
        let base_url = self.auth.base_url().await;
        let capability = metadata::fetch_metadata(&self.metadata_client, &base_url).await?;
        Ok(capability.fhir_version)
    }

    /// Get the numeric FHIR release: 2 for DSTU2, 3 for STU3, 4 for R4,
    /// 5 for R5, 0 if unknown.
    pub async fn fhir_release(&self) -> Result<u8> {
        let version = self.fhir_version().await?;
        Ok(version.as_deref().map(fhir_release).unwrap_or(0))
    }

    /// Get a reference to the session manager.
    pub fn auth(&self) -> &SessionManager {
        &self.auth
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.auth.session().await
    }
}

/// Patient-scoped view of a [`FhirClient`].
pub struct PatientContext<'a> {
    client: &'a FhirClient,
    id: Option<String>,
}

impl PatientContext<'_> {
    /// The current patient context identifier.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn scope_params(&self) -> Vec<(String, String)> {
        match &self.id {
            Some(id) => vec![("patient".to_string(), id.clone())],
            None => Vec::new(),
        }
    }

    /// Read a resource in patient scope.
    pub async fn read(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        self.client
            .http
            .request(Method::GET, path, &self.scope_params(), options)
            .await
    }

    /// Search resources in patient scope.
    pub async fn search(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        self.client
            .http
            .request(Method::GET, path, &self.scope_params(), options)
            .await
    }

    /// Create a resource in patient scope.
    pub async fn create(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        self.client
            .http
            .request(Method::POST, path, &self.scope_params(), options)
            .await
    }

    /// Update a resource in patient scope.
    pub async fn update(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        self.client
            .http
            .request(Method::PUT, path, &self.scope_params(), options)
            .await
    }

    /// Delete a resource in patient scope.
    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<serde_json::Value> {
        self.client
            .http
            .request(Method::DELETE, path, &self.scope_params(), options)
            .await
    }
}

/// Builder for [`FhirClient`].
pub struct FhirClientBuilder {
    base_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    scope: Option<String>,
    patient_id: Option<String>,
    storage: Option<Arc<dyn TokenStorage>>,
    reqwest_client: Option<reqwest::Client>,
}

impl FhirClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            client_id: None,
            client_secret: None,
            refresh_token: None,
            scope: None,
            patient_id: None,
            storage: None,
            reqwest_client: None,
        }
    }

    /// Set the FHIR server base URL (required).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the OAuth client identifier.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Set the OAuth client secret.
    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Set a refresh token directly.
    pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(token.into());
        self
    }

    /// Set the OAuth scope.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the patient context identifier.
    pub fn patient_id(mut self, id: impl Into<String>) -> Self {
        self.patient_id = Some(id.into());
        self
    }

    /// Set a session storage backend.
    ///
    /// A stored session for the base URL is loaded at build time; explicit
    /// builder fields override what was stored. Refreshed tokens are
    /// persisted back.
    pub fn storage(mut self, storage: Arc<dyn TokenStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set a custom reqwest client.
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.reqwest_client = Some(client);
        self
    }

    /// Build the client.
    pub async fn build(self) -> Result<FhirClient> {
        let base_url = self
            .base_url
            .clone()
            .ok_or_else(|| Error::Config("base_url is required".into()))?;

        let mut session = match &self.storage {
            Some(storage) => storage
                .load(&base_url)
                .await?
                .unwrap_or_else(|| Session::new(base_url.clone())),
            None => Session::new(base_url.clone()),
        };
        self.apply_overrides(&mut session);

        let mut auth_manager = SessionManager::new(session);
        if let Some(storage) = self.storage {
            auth_manager = auth_manager.with_storage(storage);
        }
        if let Some(client) = &self.reqwest_client {
            auth_manager = auth_manager.with_client(client.clone());
        }

        let auth = Arc::new(auth_manager);
        let http = match &self.reqwest_client {
            Some(client) => Arc::new(FhirHttpClient::with_client(
                client.clone(),
                Arc::clone(&auth),
            )),
            None => Arc::new(FhirHttpClient::new(Arc::clone(&auth))),
        };
        let metadata_client = self.reqwest_client.unwrap_or_default();

        info!(base_url = base_url.as_str(), "FhirClient initialized");
        Ok(FhirClient {
            auth,
            http,
            metadata_client,
        })
    }

    fn apply_overrides(&self, session: &mut Session) {
        if let Some(id) = &self.client_id {
            session.client_id = Some(id.clone());
        }
        if let Some(secret) = &self.client_secret {
            session.client_secret = Some(secret.clone());
        }
        if let Some(token) = &self.refresh_token {
            session.refresh_token = Some(token.clone());
        }
        if let Some(scope) = &self.scope {
            session.scope = Some(scope.clone());
        }
        if let Some(id) = &self.patient_id {
            session.patient_id = Some(id.clone());
        }
    }
}

impl Default for FhirClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
