//! Integration tests for the authorization-code flow using wiremock.

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fhir_smart::{AuthorizationFlow, AuthorizeOptions, Error};

/// Capability statement advertising OAuth endpoints on the mock server.
fn capability(mock_uri: &str) -> serde_json::Value {
    json!({
        "resourceType": "CapabilityStatement",
        "fhirVersion": "4.0.1",
        "rest": [{
            "mode": "server",
            "security": {
                "extension": [{
                    "url": "http://fhir-registry.smarthealthit.org/StructureDefinition/oauth-uris",
                    "extension": [
                        {"url": "authorize", "valueUri": format!("{}/authorize", mock_uri)},
                        {"url": "token", "valueUri": format!("{}/token", mock_uri)}
                    ]
                }]
            }
        }]
    })
}

async fn mount_metadata(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(capability(&mock_server.uri())))
        .mount(mock_server)
        .await;
}

fn opts(iss: &str) -> AuthorizeOptions {
    AuthorizeOptions::new("abc", "https://app/cb", "patient/*.read", iss)
        .with_client_secret("s3cret")
}

fn state_from(url: &str) -> String {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn test_authorize_url_shape() {
    let mock_server = MockServer::start().await;
    mount_metadata(&mock_server).await;

    let flow = AuthorizationFlow::new();
    let url = flow.authorize(opts(&mock_server.uri())).await.unwrap();

    assert!(url.starts_with(&format!(
        "{}/authorize?response_type=code&client_id=abc&",
        mock_server.uri()
    )));
    assert!(url.contains("scope=patient%2F%2A.read") || url.contains("scope=patient%2F*.read"));
    assert!(url.contains("redirect_uri=https%3A%2F%2Fapp%2Fcb"));
    assert!(url.contains("aud="));
    // The client secret never appears in the URL
    assert!(!url.contains("s3cret"));

    let state = state_from(&url);
    assert_eq!(state.len(), 16);
}

#[tokio::test]
async fn test_authorize_stores_pending_record_under_state() {
    let mock_server = MockServer::start().await;
    mount_metadata(&mock_server).await;

    let flow = AuthorizationFlow::new();
    let url = flow.authorize(opts(&mock_server.uri())).await.unwrap();
    let state = state_from(&url);

    let pending = flow.pending().get(&state).await.unwrap();
    assert_eq!(pending.client_id, "abc");
    assert_eq!(pending.client_secret.as_deref(), Some("s3cret"));
    assert_eq!(pending.redirect_uri, "https://app/cb");
    assert_eq!(pending.iss, mock_server.uri());
}

#[tokio::test]
async fn test_complete_auth_exchanges_code() {
    let mock_server = MockServer::start().await;
    mount_metadata(&mock_server).await;

    // Confidential client: credentials go in the Basic header, not the body.
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("authorization", "Basic YWJjOnMzY3JldA=="))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=CODE-1"))
        .and(body_string_contains("redirect_uri=https%3A%2F%2Fapp%2Fcb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ignored-here",
            "refresh_token": "R-1",
            "scope": "patient/*.read",
            "patient": "p-42"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let flow = AuthorizationFlow::new();
    let url = flow.authorize(opts(&mock_server.uri())).await.unwrap();
    let state = state_from(&url);

    let session = flow
        .complete_auth(&format!("https://app/cb?code=CODE-1&state={}", state), false)
        .await
        .unwrap();

    assert_eq!(session.base_url, mock_server.uri());
    assert_eq!(session.client_id.as_deref(), Some("abc"));
    assert_eq!(session.refresh_token.as_deref(), Some("R-1"));
    assert_eq!(session.scope.as_deref(), Some("patient/*.read"));
    assert_eq!(session.patient_id.as_deref(), Some("p-42"));
    // Completion yields a refresh-capable session, not an authenticated one
    assert!(session.access_token.is_none());
    assert!(session.expires_at.is_none());

    // Confidential clients omit body credentials by default
    let requests = mock_server.received_requests().await.unwrap();
    let token_request = requests
        .iter()
        .find(|r| r.url.path() == "/token")
        .unwrap();
    let body = String::from_utf8_lossy(&token_request.body);
    assert!(!body.contains("client_id="));
    assert!(!body.contains("client_secret="));
}

#[tokio::test]
async fn test_complete_auth_consumes_state_once() {
    let mock_server = MockServer::start().await;
    mount_metadata(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "refresh_token": "R-1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let flow = AuthorizationFlow::new();
    let url = flow.authorize(opts(&mock_server.uri())).await.unwrap();
    let state = state_from(&url);
    let redirected = format!("/cb?code=CODE-1&state={}", state);

    flow.complete_auth(&redirected, false).await.unwrap();

    let err = flow.complete_auth(&redirected, false).await.unwrap_err();
    assert!(matches!(err, Error::UnknownState));
}

#[tokio::test]
async fn test_complete_auth_denied_carries_values_verbatim() {
    let flow = AuthorizationFlow::new();
    let err = flow
        .complete_auth("/cb?error=access_denied&error_description=X", false)
        .await
        .unwrap_err();

    match err {
        Error::AuthorizationDenied { error, description } => {
            assert_eq!(error, "access_denied");
            assert_eq!(description.as_deref(), Some("X"));
        }
        other => panic!("expected AuthorizationDenied, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsafe_url_encode_forces_body_credentials() {
    let mock_server = MockServer::start().await;
    mount_metadata(&mock_server).await;

    // Header still present, and both credentials additionally in the body.
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("authorization", "Basic YWJjOnMzY3JldA=="))
        .and(body_string_contains("client_id=abc"))
        .and(body_string_contains("client_secret=s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "refresh_token": "R-1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let flow = AuthorizationFlow::new();
    let url = flow.authorize(opts(&mock_server.uri())).await.unwrap();
    let state = state_from(&url);

    flow.complete_auth(&format!("/cb?code=CODE-1&state={}", state), true)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_public_client_sends_client_id_in_body() {
    let mock_server = MockServer::start().await;
    mount_metadata(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("client_id=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "refresh_token": "R-1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let flow = AuthorizationFlow::new();
    let public = AuthorizeOptions::new("abc", "https://app/cb", "patient/*.read", mock_server.uri());
    let url = flow.authorize(public).await.unwrap();
    let state = state_from(&url);

    flow.complete_auth(&format!("/cb?code=CODE-1&state={}", state), false)
        .await
        .unwrap();

    // No secret, no Basic header
    let requests = mock_server.received_requests().await.unwrap();
    let token_request = requests
        .iter()
        .find(|r| r.url.path() == "/token")
        .unwrap();
    assert!(!token_request.headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_failed_exchange_leaves_flow_completable() {
    let mock_server = MockServer::start().await;
    mount_metadata(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "code expired"
        })))
        .mount(&mock_server)
        .await;

    let flow = AuthorizationFlow::new();
    let url = flow.authorize(opts(&mock_server.uri())).await.unwrap();
    let state = state_from(&url);

    let err = flow
        .complete_auth(&format!("/cb?code=CODE-1&state={}", state), false)
        .await
        .unwrap_err();
    match err {
        Error::TokenExchange { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "code expired");
        }
        other => panic!("expected TokenExchange, got {other:?}"),
    }

    // The pending record was not consumed
    assert!(flow.pending().get(&state).await.is_some());
}

#[tokio::test]
async fn test_authorize_fails_without_security_extension() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resourceType": "CapabilityStatement",
            "rest": [{"mode": "server"}]
        })))
        .mount(&mock_server)
        .await;

    let flow = AuthorizationFlow::new();
    let err = flow.authorize(opts(&mock_server.uri())).await.unwrap_err();
    assert!(matches!(err, Error::MissingEndpoint("authorizeUri")));
}

#[tokio::test]
async fn test_metadata_failure_propagates() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metadata"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&mock_server)
        .await;

    let flow = AuthorizationFlow::new();
    let err = flow.authorize(opts(&mock_server.uri())).await.unwrap_err();
    match err {
        Error::Metadata { status, .. } => assert_eq!(status, 502),
        other => panic!("expected Metadata, got {other:?}"),
    }
}
