//! Configuration constants and URL helpers for the FHIR client.

use std::time::Duration;

/// Safety margin for access-token expiry checks.
///
/// A token is treated as expired this long before its actual expiry so a
/// request never leaves with a token that dies in flight.
pub const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(1);

/// Length of the random `state` nonce in authorization requests.
pub const STATE_LENGTH: usize = 16;

/// Alphabet for the `state` nonce: alphanumerics plus URL-safe symbols.
pub const STATE_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// How long a pending authorization survives before eviction.
///
/// Matches the lifetime of an OAuth authorization code (minutes); abandoned
/// flows are purged instead of accumulating for the process lifetime.
pub const PENDING_FLOW_TTL: Duration = Duration::from_secs(600);

/// Connect timeout for HTTP requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Total timeout for HTTP requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Scope sent on refresh when the session has none.
pub const DEFAULT_SCOPE: &str = "offline_access";

/// Media type for FHIR JSON payloads.
pub const FHIR_JSON: &str = "application/fhir+json";

/// Conventional path of the capability statement.
pub const METADATA_PATH: &str = "metadata";

/// Returns the capability statement URL for a server base URL.
///
/// A trailing slash on the base is normalized away.
pub fn metadata_url(base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), METADATA_PATH)
}

/// Returns the target URL for a resource request.
///
/// Absolute paths (anything with a scheme prefix) pass through verbatim;
/// relative paths are joined to the base with a single separator.
pub fn resource_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
