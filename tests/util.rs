// tests/util.rs
// Shared helpers for the gateway integration tests: fake Google issuer,
// fake phrase service and cookie plumbing around axum-test.
#![allow(dead_code)]

use axum::http::{header::SET_COOKIE, HeaderValue};
use axum_test::{TestResponse, TestServer};
use hashira_auth::api::server::GatewayServer;
use hashira_auth::auth::config::{DisplayNameConfig, GoogleConfig, TwitterConfig};
use hashira_auth::auth::{AuthConfig, AuthService};
use httpmock::{Method::GET, Mock, MockServer};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

pub const CLIENT_ID: &str = "client-1";
pub const SIGNING_SECRET: &[u8] = b"hashira-auth-test-signing-key-000";
pub const SIGNING_SECRET_B64: &str = "aGFzaGlyYS1hdXRoLXRlc3Qtc2lnbmluZy1rZXktMDAw";
pub const PHRASE_PATH: &str = "/api/v1/phrase";

/// Config with Google and Twitter pointed at `provider`
/// and the phrase service at `phrases`
pub fn test_config(provider: &MockServer, phrases: &MockServer) -> AuthConfig {
    let mut google = GoogleConfig::new(CLIENT_ID, "client-secret");
    google.issuer_url = provider.base_url();
    google.id_token_algorithms = vec![Algorithm::HS256];

    let mut twitter = TwitterConfig::new("consumer-key", "consumer-secret");
    twitter.api_base = provider.base_url();

    AuthConfig {
        google: Some(google),
        twitter: Some(twitter),
        display_name: DisplayNameConfig {
            url: phrases.url(PHRASE_PATH),
            timeout_ms: 1000,
            fallback: "anonymous".to_string(),
        },
        ..AuthConfig::default()
    }
}

pub async fn test_server(config: AuthConfig) -> (TestServer, Arc<AuthService>) {
    let service = Arc::new(AuthService::from_config(config).await.unwrap());
    let router = GatewayServer::from_service(service.clone()).create_router();
    (TestServer::new(router).unwrap(), service)
}

/// Discovery document and key set of a fake issuer
pub async fn mock_google_issuer(server: &MockServer) {
    let base = server.base_url();
    server
        .mock_async(|when, then| {
            when.method(GET).path("/.well-known/openid-configuration");
            then.status(200).json_body(json!({
                "issuer": base,
                "authorization_endpoint": format!("{}/o/oauth2/v2/auth", base),
                "token_endpoint": format!("{}/token", base),
                "jwks_uri": format!("{}/certs", base),
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/certs");
            then.status(200).json_body(json!({
                "keys": [{"kty": "oct", "kid": "k1", "alg": "HS256", "k": SIGNING_SECRET_B64}]
            }));
        })
        .await;
}

pub fn google_id_token(issuer: &str, sub: &str, nonce: &str) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some("k1".to_string());
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "iss": issuer,
        "aud": CLIENT_ID,
        "sub": sub,
        "nonce": nonce,
        "iat": now,
        "exp": now + 300,
    });
    encode(&header, &claims, &EncodingKey::from_secret(SIGNING_SECRET)).unwrap()
}

/// Token endpoint answering with an ID token for `sub` bound to `nonce`
pub async fn mock_google_token<'a>(server: &'a MockServer, sub: &str, nonce: &str) -> Mock<'a> {
    let id_token = google_id_token(&server.base_url(), sub, nonce);
    server
        .mock_async(|when, then| {
            when.method(httpmock::Method::POST).path("/token");
            then.status(200)
                .json_body(json!({"access_token": "at", "token_type": "Bearer", "id_token": id_token}));
        })
        .await
}

pub async fn mock_phrase<'a>(server: &'a MockServer, phrase: &str) -> Mock<'a> {
    server
        .mock_async(|when, then| {
            when.method(GET).path(PHRASE_PATH);
            then.status(200).body(phrase);
        })
        .await
}

/// Value of cookie `name` among the response `Set-Cookie` headers
pub fn set_cookie(response: &TestResponse, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| cookie::Cookie::parse(v.to_string()).ok())
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

pub fn cookie_header(name: &str, value: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{}={}", name, value)).unwrap()
}

pub fn location(response: &TestResponse) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string()
}

pub fn query_params(url: &str) -> HashMap<String, String> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect()
}
