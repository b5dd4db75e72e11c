//! Route-level behavior that needs no provider round trip

mod util;

use axum::http::{header::COOKIE, StatusCode};
use chrono::Utc;
use hashira_auth::api::cookie_config::SESSION_COOKIE;
use hashira_auth::auth::api::handlers::ANONYMOUS_MESSAGE;
use hashira_auth::auth::storage::{SessionToUserId, UserIdToUser};
use hashira_auth::auth::{AuthConfig, User, UserId};
use httpmock::MockServer;
use serde_json::Value;
use test_case::test_case;
use util::*;
use uuid::Uuid;

async fn anonymous_server() -> (axum_test::TestServer, std::sync::Arc<hashira_auth::auth::AuthService>) {
    test_server(AuthConfig::default()).await
}

#[tokio::test]
async fn test_health() {
    let (server, _) = anonymous_server().await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_index_without_cookie() {
    let (server, _) = anonymous_server().await;
    let response = server.get("/").await;
    response.assert_status_ok();
    assert_eq!(response.text(), ANONYMOUS_MESSAGE);
}

#[test_case("not-a-uuid" ; "malformed token")]
#[test_case("6f1c1f2e-8a0e-4d51-9a57-3d2b7f0c1e11" ; "unknown token")]
#[tokio::test]
async fn test_index_with_unknown_session(token: &str) {
    let (server, _) = anonymous_server().await;
    let response = server
        .get("/")
        .add_header(COOKIE, cookie_header(SESSION_COOKIE, token))
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), ANONYMOUS_MESSAGE);
}

#[tokio::test]
async fn test_me_requires_session() {
    let (server, _) = anonymous_server().await;
    let response = server.get("/api/me").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
async fn test_session_seeded_in_store() {
    let (server, service) = anonymous_server().await;
    let user = User {
        id: UserId::generate(),
        display_name: "brave-otter".to_string(),
        created_at: Utc::now(),
    };
    let token = Uuid::new_v4().to_string();
    service
        .store()
        .put::<UserIdToUser>(&user.id.to_string(), &user)
        .await
        .unwrap();
    service
        .store()
        .put::<SessionToUserId>(&token, &user.id)
        .await
        .unwrap();

    let greeting = server
        .get("/")
        .add_header(COOKIE, cookie_header(SESSION_COOKIE, &token))
        .await
        .text();
    assert_eq!(greeting, "Hello, brave-otter!");

    let me: User = server
        .get("/api/me")
        .add_header(COOKIE, cookie_header(SESSION_COOKIE, &token))
        .await
        .json();
    assert_eq!(me, user);
}

#[tokio::test]
async fn test_dangling_session_is_server_error() {
    let (server, service) = anonymous_server().await;
    let token = Uuid::new_v4().to_string();
    service
        .store()
        .put::<SessionToUserId>(&token, &UserId::generate())
        .await
        .unwrap();

    let response = server
        .get("/")
        .add_header(COOKIE, cookie_header(SESSION_COOKIE, &token))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "storage_corruption");
    assert_eq!(body["details"], Value::Null);
}

#[test_case("/auth/facebook" ; "unknown provider")]
#[test_case("/auth/google" ; "google not configured")]
#[test_case("/auth/twitter" ; "twitter not configured")]
#[tokio::test]
async fn test_login_with_unavailable_provider(path: &str) {
    let (server, _) = anonymous_server().await;
    let response = server.get(path).await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "unknown_provider");
}

#[tokio::test]
async fn test_provider_outage_is_bad_gateway() {
    let provider = MockServer::start_async().await;
    let phrases = MockServer::start_async().await;
    // No discovery document mocked: the issuer answers 404.
    let (server, service) = test_server(test_config(&provider, &phrases)).await;

    let response = server.get("/auth/google").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    assert!(service.flows().is_empty());
}
