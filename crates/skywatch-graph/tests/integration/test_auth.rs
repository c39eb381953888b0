//! Integration tests for the OAuth2 PKCE token exchange and refresh
//!
//! The identity platform authority points at a wiremock server, so the
//! token endpoint is `{server}/oauth2/v2.0/token`.

use oauth2::PkceCodeVerifier;
use skywatch_core::ports::ISessionProvider;
use skywatch_graph::auth::PKCEFlow;
use skywatch_graph::provider::GraphSessionProvider;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, ResponseTemplate,
};

use crate::common;

#[tokio::test]
async fn test_exchange_code_returns_tokens() {
    let server = wiremock::MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let flow = PKCEFlow::new(&common::oauth_config(&server)).unwrap();
    let (_url, _csrf, verifier) = flow.generate_auth_url();
    let tokens = flow
        .exchange_code("auth-code-1".to_string(), verifier)
        .await
        .unwrap();

    assert_eq!(tokens.access_token, "access-1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!tokens.is_expired());
    assert!(!tokens.expires_within(chrono::Duration::minutes(50)));
}

#[tokio::test]
async fn test_exchange_code_rejected() {
    let server = wiremock::MockServer::start().await;
    common::mount_token(
        &server,
        400,
        serde_json::json!({
            "error": "invalid_grant",
            "error_description": "The code has expired"
        }),
    )
    .await;

    let flow = PKCEFlow::new(&common::oauth_config(&server)).unwrap();
    let result = flow
        .exchange_code(
            "stale".to_string(),
            PkceCodeVerifier::new("v".repeat(43)),
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_refresh_keeps_previous_refresh_token() {
    let server = wiremock::MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-2",
            "token_type": "Bearer",
            "expires_in": 600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let flow = PKCEFlow::new(&common::oauth_config(&server)).unwrap();
    let tokens = flow.refresh_token("refresh-old").await.unwrap();

    assert_eq!(tokens.access_token, "access-2");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-old"));
    assert!(tokens.expires_within(chrono::Duration::minutes(11)));
}

#[tokio::test]
async fn test_session_provider_exchanges_and_opens_directory() {
    let server = wiremock::MockServer::start().await;
    common::mount_token(
        &server,
        200,
        serde_json::json!({
            "access_token": "session-access",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "session-refresh"
        }),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/children"))
        .and(header("authorization", "Bearer session-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "ROOT-FILE", "name": "watched.txt"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider =
        GraphSessionProvider::with_base_url(&common::oauth_config(&server), server.uri()).unwrap();

    let pending = provider.consent_request().unwrap();
    assert!(pending.request.url.starts_with(&server.uri()));
    assert!(pending.request.url.contains("code_challenge="));

    let tokens = provider.exchange_code(pending, "code-xyz").await.unwrap();
    let directory = provider.open(&tokens).unwrap();
    let entries = directory.list("/me/drive/root/children").await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "watched.txt");
}
