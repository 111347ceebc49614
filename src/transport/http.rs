//! HTTP execution for FHIR resource requests.
//!
//! Every request goes through a pre-flight token check, carries the standard
//! FHIR headers, and comes back as a sanitized `serde_json::Value`. Failures
//! surface as typed errors; callers who want fail-soft behavior choose it
//! themselves.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::Method;
use tracing::{debug, warn};

use crate::auth::SessionManager;
use crate::config::{resource_url, CONNECT_TIMEOUT, REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use crate::transport::headers::fhir_headers;

/// Caller-supplied options for a resource request.
///
/// Headers and query parameters are merged with the client's defaults; on a
/// key collision the caller wins.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra query parameters.
    pub params: Vec<(String, String)>,
    /// Extra headers.
    pub headers: HeaderMap,
    /// JSON request body (create/update).
    pub body: Option<serde_json::Value>,
}

impl RequestOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set the JSON body.
    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// HTTP client executing authenticated FHIR requests.
pub struct FhirHttpClient {
    client: reqwest::Client,
    auth: Arc<SessionManager>,
}

impl FhirHttpClient {
    /// Create a new HTTP client.
    pub fn new(auth: Arc<SessionManager>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, auth }
    }

    /// Create with a custom reqwest client.
    pub fn with_client(client: reqwest::Client, auth: Arc<SessionManager>) -> Self {
        Self { client, auth }
    }

    /// Execute a resource request.
    ///
    /// `scope_params` come from the namespace the call was made through (e.g.
    /// the patient context) and are applied before caller params, so caller
    /// params override on collision.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        scope_params: &[(String, String)],
        options: RequestOptions,
    ) -> Result<serde_json::Value> {
        // Pre-flight: refresh when the token is missing or near expiry.
        let token = self.auth.get_access_token().await?;

        let base_url = self.auth.base_url().await;
        let url = resource_url(&base_url, path);

        let mut headers = fhir_headers(&token);
        for (name, value) in options.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        let mut params: Vec<(String, String)> = scope_params.to_vec();
        for (key, value) in options.params {
            params.retain(|(existing, _)| existing != &key);
            params.push((key, value));
        }

        debug!(method = method.as_str(), url = url.as_str(), "FHIR request");

        let mut request = self.client.request(method, &url).headers(headers);
        if !params.is_empty() {
            request = request.query(&params);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), url = url.as_str(), "FHIR request failed");
            return Err(Error::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        Ok(serde_json::from_str(&sanitize_body(&body))?)
    }
}

/// Strip every literal `\u0000` escape from a response body.
///
/// Some servers emit embedded NUL escapes in malformed FHIR payloads; they
/// are removed before parsing, leaving all other content untouched.
fn sanitize_body(body: &str) -> String {
    body.replace("\\u0000", "")
}

impl std::fmt::Debug for FhirHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FhirHttpClient")
            .field("auth", &self.auth)
            .finish()
    }
}
