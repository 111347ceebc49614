//! Authentication-related types.

use serde::{Deserialize, Serialize};

use crate::config::EXPIRY_SAFETY_MARGIN;

/// One authenticated connection to a FHIR server.
///
/// A session is created either directly from a known refresh token (via
/// [`crate::FhirClientBuilder`]) or by completing an authorization flow with
/// [`crate::AuthorizationFlow::complete_auth`]. Completion yields a
/// refresh-capable session with no access token; the first authenticated
/// request performs the initial refresh.
///
/// Invariant: `access_token` and `expires_at` are set and cleared together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// FHIR server base URL (the `iss`).
    pub base_url: String,
    /// OAuth client identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// OAuth client secret (confidential clients only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Granted OAuth scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Patient context identifier from the SMART launch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    /// Current access token, absent until the first refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Long-lived refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix timestamp when the access token expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Session {
    /// Create a session with a known refresh token and no access token yet.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: None,
            client_secret: None,
            scope: None,
            patient_id: None,
            access_token: None,
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Check whether the access token must be refreshed before use.
    ///
    /// Returns `true` when no expiry is set (never authenticated) or when the
    /// current time is within the safety margin of the expiry. This is the
    /// sole automatic-refresh trigger; it does not distinguish "never
    /// authenticated" from "expired".
    #[must_use]
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at {
            Some(exp) => {
                let now = chrono::Utc::now().timestamp();
                now >= exp - EXPIRY_SAFETY_MARGIN.as_secs() as i64
            }
            None => true,
        }
    }

    /// Record a fresh access token and its expiry.
    pub(crate) fn set_access_token(&mut self, access_token: String, expires_in: i64) {
        self.access_token = Some(access_token);
        self.expires_at = Some(chrono::Utc::now().timestamp() + expires_in);
    }
}

/// Response consumed from the token endpoint after an authorization_code grant.
#[derive(Debug, Deserialize)]
pub struct TokenExchangeResponse {
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// SMART patient-context extension.
    #[serde(default)]
    pub patient: Option<String>,
}

/// Response consumed from the token endpoint after a refresh_token grant.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub patient: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// Error payload from the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_refresh_without_expiry() {
        let session = Session::new("https://fhir.example/r4");
        assert!(session.needs_refresh());
    }

    #[test]
    fn test_needs_refresh_within_margin() {
        let mut session = Session::new("https://fhir.example/r4");
        session.access_token = Some("T".into());
        session.expires_at = Some(chrono::Utc::now().timestamp() + 1);
        assert!(session.needs_refresh());
    }

    #[test]
    fn test_fresh_token_does_not_need_refresh() {
        let mut session = Session::new("https://fhir.example/r4");
        session.set_access_token("T".into(), 3600);
        assert!(!session.needs_refresh());
    }

    #[test]
    fn test_set_access_token_sets_both_fields() {
        let mut session = Session::new("https://fhir.example/r4");
        session.set_access_token("T".into(), 3600);
        assert_eq!(session.access_token.as_deref(), Some("T"));
        let expected = chrono::Utc::now().timestamp() + 3600;
        let actual = session.expires_at.unwrap();
        assert!((actual - expected).abs() <= 1);
    }

    #[test]
    fn test_refresh_response_default_expires_in() {
        let resp: RefreshResponse = serde_json::from_str(r#"{"access_token":"T"}"#).unwrap();
        assert_eq!(resp.expires_in, 3600);
        assert!(resp.refresh_token.is_none());
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let mut session = Session::new("https://fhir.example/r4");
        session.client_id = Some("abc".into());
        session.refresh_token = Some("R".into());
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.base_url, session.base_url);
        assert_eq!(back.client_id, session.client_id);
        assert_eq!(back.refresh_token, session.refresh_token);
        assert!(back.access_token.is_none());
    }
}
