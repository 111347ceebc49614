//! Capability statement fetching and SMART security-extension extraction.
//!
//! The capability statement is read unauthenticated from `<base>/metadata`.
//! OAuth endpoints are advertised as a nested extension list under
//! `rest[0].security.extension[0].extension[]`, each item contributing a
//! `"<url>Uri" -> valueUri` pair (so `url: "authorize"` becomes
//! `authorizeUri`). Endpoints are re-resolved per request rather than cached;
//! staleness is traded away for simplicity.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::config::metadata_url;
use crate::error::{Error, Result};

/// The subset of a FHIR capability statement this client reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatement {
    /// Server FHIR version, e.g. `"4.0.1"`.
    #[serde(default)]
    pub fhir_version: Option<String>,
    #[serde(default)]
    pub rest: Vec<RestEntry>,
}

/// One `rest` entry of the capability statement.
#[derive(Debug, Clone, Deserialize)]
pub struct RestEntry {
    #[serde(default)]
    pub security: Option<SecurityEntry>,
}

/// The `security` element of a `rest` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityEntry {
    #[serde(default)]
    pub extension: Vec<Extension>,
}

/// A (possibly nested) FHIR extension carrying a URI value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub value_uri: Option<String>,
    #[serde(default)]
    pub extension: Vec<Extension>,
}

/// Resolved OAuth endpoint URIs for one server.
///
/// Immutable once computed. The mapping is empty when the capability
/// statement lacks a security extension; consumers see a typed
/// [`Error::MissingEndpoint`] when they ask for an endpoint that is absent.
#[derive(Debug, Clone, Default)]
pub struct SecurityEndpoints {
    uris: HashMap<String, String>,
}

impl SecurityEndpoints {
    /// Extract endpoint URIs from a capability statement.
    pub fn from_capability(capability: &CapabilityStatement) -> Self {
        let mut uris = HashMap::new();
        let extensions = capability
            .rest
            .first()
            .and_then(|rest| rest.security.as_ref())
            .and_then(|security| security.extension.first())
            .map(|outer| outer.extension.as_slice())
            .unwrap_or_default();

        for ext in extensions {
            if let (Some(url), Some(value)) = (&ext.url, &ext.value_uri) {
                uris.insert(format!("{}Uri", url), value.clone());
            }
        }
        Self { uris }
    }

    /// Look up an endpoint by its mapped key (e.g. `"authorizeUri"`).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.uris.get(key).map(String::as_str)
    }

    /// The authorization endpoint.
    pub fn authorize_uri(&self) -> Result<&str> {
        self.get("authorizeUri")
            .ok_or(Error::MissingEndpoint("authorizeUri"))
    }

    /// The token endpoint.
    pub fn token_uri(&self) -> Result<&str> {
        self.get("tokenUri")
            .ok_or(Error::MissingEndpoint("tokenUri"))
    }

    /// Number of advertised endpoints.
    pub fn len(&self) -> usize {
        self.uris.len()
    }

    /// Whether any endpoint was advertised.
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}

/// Fetch the capability statement from `<base>/metadata`.
///
/// Unauthenticated; transport failures propagate unchanged with no retry.
pub async fn fetch_metadata(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<CapabilityStatement> {
    let url = metadata_url(base_url);
    debug!(url = url.as_str(), "Fetching capability statement");

    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        return Err(Error::Metadata { status, message });
    }

    Ok(response.json().await?)
}

/// Resolve the OAuth endpoints advertised by a server.
pub async fn security_endpoints(
    client: &reqwest::Client,
    base_url: &str,
) -> Result<SecurityEndpoints> {
    let capability = fetch_metadata(client, base_url).await?;
    Ok(SecurityEndpoints::from_capability(&capability))
}

/// Map a FHIR version string to its numeric release.
///
/// 2 for DSTU2, 3 for STU3, 4 for R4, 5 for R5, 0 if unknown.
pub fn fhir_release(version: &str) -> u8 {
    match version {
        "0.4.0" | "0.5.0" | "1.0.0" | "1.0.1" | "1.0.2" => 2,
        "1.1.0" | "1.4.0" | "1.6.0" | "1.8.0" | "3.0.0" | "3.0.1" | "3.0.2" => 3,
        "3.3.0" | "3.5.0" | "4.0.0" | "4.0.1" => 4,
        "4.3.0" | "5.0.0" | "5.0.1" | "5.1.0" | "5.2.0" | "5.3.0" | "5.4.0" => 5,
        _ => 0,
    }
}
