//! Error types for the fhir-smart crate.

use std::path::Path;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors produced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The authorization server redirected back with an `error` parameter.
    #[error("authorization denied: {error}{}", description.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    AuthorizationDenied {
        /// OAuth error code (e.g. `access_denied`).
        error: String,
        /// Optional `error_description` from the redirect.
        description: Option<String>,
    },

    /// The redirect is missing the `code` parameter.
    #[error("redirect is missing the authorization code")]
    MissingCode,

    /// The redirect is missing the `state` parameter.
    #[error("redirect is missing the state parameter")]
    MissingState,

    /// The `state` nonce does not match any pending authorization.
    ///
    /// The flow is unknown, already consumed, or evicted after its TTL.
    #[error("unknown or expired state token")]
    UnknownState,

    /// The token endpoint rejected an exchange or refresh request.
    #[error("token endpoint returned {status}: {message}")]
    TokenExchange { status: u16, message: String },

    /// The metadata endpoint returned a non-success status.
    #[error("metadata endpoint returned {status}: {message}")]
    Metadata { status: u16, message: String },

    /// The capability statement does not advertise a required OAuth endpoint.
    #[error("security extension does not advertise '{0}'")]
    MissingEndpoint(&'static str),

    /// A resource request failed with a non-success status.
    #[error("FHIR server returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Underlying HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// No credentials available for an authenticated operation.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A required credential field is missing.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Response body could not be parsed as JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Token storage I/O failure.
    #[error("storage error at {path}: {message}")]
    StorageIo { path: String, message: String },

    /// Token storage (de)serialization failure.
    #[error("storage serialization error: {0}")]
    StorageSerialization(String),
}

impl Error {
    /// Build a storage I/O error for a path.
    pub fn storage_io(path: &Path, message: impl Into<String>) -> Self {
        Self::StorageIo {
            path: path.display().to_string(),
            message: message.into(),
        }
    }
}
