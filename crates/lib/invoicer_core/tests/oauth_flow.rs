//! Authorization-code flow against a mock identity provider.

use std::sync::Arc;

use invoicer_core::auth::oauth::{OAuthBroker, OAuthError, OAuthSettings};
use invoicer_core::auth::store::CredentialStore;
use invoicer_core::models::auth::Provider;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> OAuthSettings {
    OAuthSettings {
        client_id: "client-123".into(),
        client_secret: "client-secret".into(),
        redirect_url: "http://localhost:8080/api/auth/google/callback".into(),
        auth_url: format!("{}/auth", server.uri()),
        token_url: format!("{}/token", server.uri()),
        userinfo_url: format!("{}/userinfo", server.uri()),
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=good-code"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "upstream-access",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .mount(server)
        .await;
}

async fn mount_userinfo(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer upstream-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn completes_flow_and_upserts_user() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_userinfo(
        &server,
        json!({"email": "Jane@Example.com", "name": "Jane Doe", "verified_email": true}),
    )
    .await;

    let store = Arc::new(CredentialStore::new());
    let broker = OAuthBroker::new(settings(&server), Arc::clone(&store)).unwrap();

    let user = broker.complete_flow("good-code").await.unwrap();
    assert_eq!(user.email, "jane@example.com");
    assert_eq!(user.name, "Jane Doe");
    assert_eq!(user.provider, Provider::Google);
    assert!(user.password_hash.is_none());

    // A second login maps to the same account.
    let again = broker.complete_flow("good-code").await.unwrap();
    assert_eq!(again.id, user.id);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn unverified_email_is_rejected() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    mount_userinfo(
        &server,
        json!({"email": "jane@example.com", "name": "Jane", "verified_email": false}),
    )
    .await;

    let store = Arc::new(CredentialStore::new());
    let broker = OAuthBroker::new(settings(&server), Arc::clone(&store)).unwrap();

    let err = broker.complete_flow("good-code").await.unwrap_err();
    assert!(matches!(err, OAuthError::UnverifiedEmail));
    assert!(store.is_empty());
}

#[tokio::test]
async fn token_endpoint_failure_is_reported_as_exchange_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let broker = OAuthBroker::new(settings(&server), Arc::new(CredentialStore::new())).unwrap();

    let err = broker.complete_flow("bad-code").await.unwrap_err();
    assert!(matches!(
        err,
        OAuthError::UpstreamStatus {
            endpoint: "token",
            status: 400
        }
    ));
}

#[tokio::test]
async fn userinfo_failure_is_distinguishable_from_exchange_failure() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let broker = OAuthBroker::new(settings(&server), Arc::new(CredentialStore::new())).unwrap();

    let err = broker.complete_flow("good-code").await.unwrap_err();
    assert!(matches!(
        err,
        OAuthError::UpstreamStatus {
            endpoint: "userinfo",
            status: 503
        }
    ));
}

#[tokio::test]
async fn unexpected_token_shape_is_an_exchange_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let broker = OAuthBroker::new(settings(&server), Arc::new(CredentialStore::new())).unwrap();

    let err = broker.complete_flow("good-code").await.unwrap_err();
    assert!(matches!(err, OAuthError::ExchangeFailed(_)));
}

#[tokio::test]
async fn unreachable_provider_is_an_exchange_failure() {
    let server = MockServer::start().await;
    let mut unreachable = settings(&server);
    unreachable.token_url = "http://127.0.0.1:9/token".into();
    drop(server);

    let broker = OAuthBroker::new(unreachable, Arc::new(CredentialStore::new())).unwrap();

    let err = broker.complete_flow("good-code").await.unwrap_err();
    assert!(matches!(err, OAuthError::ExchangeFailed(_)));
}
