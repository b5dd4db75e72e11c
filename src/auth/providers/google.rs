//! Google sign-in (OpenID Connect authorization code flow)
//!
//! Endpoints come from the issuer's discovery document. ID tokens are checked
//! locally against the issuer's published JWKS: signature, audience, issuer,
//! expiry and the per-flow nonce.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, DecodingKey, Validation};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use super::r#trait::{AuthorizationRequest, CallbackParams, LoginProvider};
use crate::auth::config::GoogleConfig;
use crate::auth::core::random::random_token;
use crate::auth::errors::AuthError;
use crate::auth::flow_store::{FlowSecret, PendingFlow};
use crate::auth::types::{ExternalIdentity, ProviderKind};

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
const SCOPES: &str = "openid profile email";
// Google tokens may carry the issuer without its scheme.
const GOOGLE_ISSUER: &str = "https://accounts.google.com";
const GOOGLE_ISSUER_BARE: &str = "accounts.google.com";

/// Subset of the OpenID provider metadata we use
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    nonce: Option<String>,
}

/// Google provider
pub struct GoogleProvider {
    config: GoogleConfig,
    redirect_uri: String,
    http: reqwest::Client,
    metadata: OnceCell<ProviderMetadata>,
    jwks: RwLock<Option<JwkSet>>,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig, redirect_uri: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            config,
            redirect_uri: redirect_uri.into(),
            http,
            metadata: OnceCell::new(),
            jwks: RwLock::new(None),
        }
    }

    /// Discovery document, fetched once
    pub async fn metadata(&self) -> Result<&ProviderMetadata, AuthError> {
        self.metadata.get_or_try_init(|| self.discover()).await
    }

    async fn discover(&self) -> Result<ProviderMetadata, AuthError> {
        let issuer = self.config.issuer_url.trim_end_matches('/');
        let url = format!("{}{}", issuer, DISCOVERY_PATH);
        debug!("fetching OpenID configuration from {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::ProviderRequest(format!("discovery: {}", e)))?;
        if !response.status().is_success() {
            return Err(AuthError::ProviderRequest(format!(
                "discovery: status {}",
                response.status()
            )));
        }
        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| AuthError::ProviderRequest(format!("discovery: {}", e)))?;

        if metadata.issuer.trim_end_matches('/') != issuer {
            return Err(AuthError::ProviderRequest(format!(
                "issuer did not match: expected {}, got {}",
                issuer, metadata.issuer
            )));
        }
        info!("OpenID configuration loaded for {}", metadata.issuer);
        Ok(metadata)
    }

    fn authorization_url(
        &self,
        metadata: &ProviderMetadata,
        state: &str,
        nonce: &str,
    ) -> Result<String, AuthError> {
        let url = Url::parse_with_params(
            &metadata.authorization_endpoint,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("nonce", nonce),
            ],
        )
        .map_err(|e| AuthError::ProviderRequest(format!("authorization endpoint: {}", e)))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, metadata: &ProviderMetadata, code: &str) -> Result<String, AuthError> {
        let response = self
            .http
            .post(&metadata.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange(format!("status {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
        token.id_token.ok_or(AuthError::MissingIdToken)
    }

    async fn fetch_jwks(&self, metadata: &ProviderMetadata) -> Result<JwkSet, AuthError> {
        let response = self
            .http
            .get(&metadata.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::ProviderRequest(format!("jwks: {}", e)))?;
        if !response.status().is_success() {
            return Err(AuthError::ProviderRequest(format!("jwks: status {}", response.status())));
        }
        response
            .json()
            .await
            .map_err(|e| AuthError::ProviderRequest(format!("jwks: {}", e)))
    }

    /// Key for `kid`; the key set is refetched once when the kid is unknown
    /// so that provider key rotation is picked up.
    async fn decoding_key(&self, metadata: &ProviderMetadata, kid: Option<&str>) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.cached_key(kid).await? {
            return Ok(key);
        }

        let jwks = self.fetch_jwks(metadata).await?;
        *self.jwks.write().await = Some(jwks);

        self.cached_key(kid)
            .await?
            .ok_or_else(|| AuthError::IdTokenVerification("no matching signing key".to_string()))
    }

    async fn cached_key(&self, kid: Option<&str>) -> Result<Option<DecodingKey>, AuthError> {
        let jwks = self.jwks.read().await;
        let Some(jwks) = jwks.as_ref() else {
            return Ok(None);
        };
        let jwk = match kid {
            Some(kid) => jwks.find(kid),
            // Without a kid only an unambiguous key set is usable.
            None if jwks.keys.len() == 1 => jwks.keys.first(),
            None => None,
        };
        jwk.map(|jwk| {
            DecodingKey::from_jwk(jwk).map_err(|e| AuthError::IdTokenVerification(e.to_string()))
        })
        .transpose()
    }

    async fn verify_id_token(
        &self,
        metadata: &ProviderMetadata,
        raw: &str,
        expected_nonce: &str,
    ) -> Result<IdTokenClaims, AuthError> {
        let header = decode_header(raw).map_err(|e| AuthError::IdTokenVerification(e.to_string()))?;
        if !self.config.id_token_algorithms.contains(&header.alg) {
            return Err(AuthError::IdTokenVerification(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }

        let key = self.decoding_key(metadata, header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.algorithms = vec![header.alg];
        validation.set_audience(&[self.config.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);
        let mut issuers = vec![metadata.issuer.as_str()];
        if metadata.issuer == GOOGLE_ISSUER {
            issuers.push(GOOGLE_ISSUER_BARE);
        }
        validation.set_issuer(&issuers);

        let claims = decode::<IdTokenClaims>(raw, &key, &validation)
            .map_err(|e| AuthError::IdTokenVerification(e.to_string()))?
            .claims;

        let nonce_ok = claims
            .nonce
            .as_deref()
            .map(|n| bool::from(n.as_bytes().ct_eq(expected_nonce.as_bytes())))
            .unwrap_or(false);
        if !nonce_ok {
            return Err(AuthError::IdTokenVerification("nonce did not match".to_string()));
        }
        if claims.sub.is_empty() {
            return Err(AuthError::IdTokenVerification("empty subject".to_string()));
        }
        Ok(claims)
    }
}

#[async_trait]
impl LoginProvider for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn begin(&self) -> Result<AuthorizationRequest, AuthError> {
        let metadata = self.metadata().await?;
        let state = random_token(32);
        let nonce = random_token(32);
        let url = self.authorization_url(metadata, &state, &nonce)?;

        Ok(AuthorizationRequest {
            url,
            flow: PendingFlow::new(ProviderKind::Google, FlowSecret::Google { state, nonce }),
        })
    }

    async fn complete(
        &self,
        flow: PendingFlow,
        params: &CallbackParams,
    ) -> Result<ExternalIdentity, AuthError> {
        let FlowSecret::Google { state, nonce } = flow.secret else {
            return Err(AuthError::FlowNotFound);
        };

        if let Some(error) = params.get("error") {
            return Err(AuthError::ProviderDenied(error.clone()));
        }

        let state_ok = params
            .get("state")
            .map(|s| bool::from(s.as_bytes().ct_eq(state.as_bytes())))
            .unwrap_or(false);
        if !state_ok {
            warn!("google callback state did not match");
            return Err(AuthError::StateMismatch);
        }

        let code = params
            .get("code")
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::ProviderDenied("missing authorization code".to_string()))?;

        let metadata = self.metadata().await?;
        let raw_id_token = self.exchange_code(metadata, code).await?;
        let claims = self.verify_id_token(metadata, &raw_id_token, &nonce).await?;

        debug!("google id token verified");
        Ok(ExternalIdentity::new(ProviderKind::Google, claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, MockServer};
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"hashira-auth-test-signing-key-000";
    const SECRET_B64: &str = "aGFzaGlyYS1hdXRoLXRlc3Qtc2lnbmluZy1rZXktMDAw";

    fn provider(server: &MockServer) -> GoogleProvider {
        let mut config = GoogleConfig::new("client-1", "secret-1");
        config.issuer_url = server.base_url();
        config.id_token_algorithms = vec![Algorithm::HS256];
        GoogleProvider::new(config, "http://localhost:8080/auth/google/callback", reqwest::Client::new())
    }

    async fn mock_discovery(server: &MockServer) {
        let base = server.base_url();
        server
            .mock_async(|when, then| {
                when.method(GET).path(DISCOVERY_PATH);
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
                    "keys": [{"kty": "oct", "kid": "k1", "alg": "HS256", "k": SECRET_B64}]
                }));
            })
            .await;
    }

    fn id_token(server: &MockServer, sub: &str, nonce: &str, aud: &str) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some("k1".to_string());
        let claims = json!({
            "iss": server.base_url(),
            "aud": aud,
            "sub": sub,
            "nonce": nonce,
            "exp": chrono::Utc::now().timestamp() + 300,
            "iat": chrono::Utc::now().timestamp(),
        });
        encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn flow(state: &str, nonce: &str) -> PendingFlow {
        PendingFlow::new(
            ProviderKind::Google,
            FlowSecret::Google {
                state: state.into(),
                nonce: nonce.into(),
            },
        )
    }

    fn params(pairs: &[(&str, &str)]) -> CallbackParams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_begin_builds_authorization_url() {
        let server = MockServer::start_async().await;
        mock_discovery(&server).await;
        let provider = provider(&server);

        let request = provider.begin().await.unwrap();
        let url = Url::parse(&request.url).unwrap();
        assert_eq!(url.path(), "/o/oauth2/v2/auth");

        let query: CallbackParams = url.query_pairs().into_owned().collect();
        let FlowSecret::Google { state, nonce } = &request.flow.secret else {
            panic!("expected google flow");
        };
        assert_eq!(query["state"], *state);
        assert_eq!(query["nonce"], *nonce);
        assert_eq!(query["client_id"], "client-1");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["redirect_uri"], "http://localhost:8080/auth/google/callback");
        assert!(query["scope"].split(' ').any(|s| s == "openid"));
    }

    #[tokio::test]
    async fn test_complete_verifies_id_token() {
        let server = MockServer::start_async().await;
        mock_discovery(&server).await;
        let token = id_token(&server, "g-123", "nonce-1", "client-1");
        let exchange = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .body_contains("code=auth-code")
                    .body_contains("grant_type=authorization_code");
                then.status(200).json_body(json!({"access_token": "at", "id_token": token}));
            })
            .await;

        let identity = provider(&server)
            .complete(
                flow("state-1", "nonce-1"),
                &params(&[("state", "state-1"), ("code", "auth-code")]),
            )
            .await
            .unwrap();

        assert_eq!(identity, ExternalIdentity::new(ProviderKind::Google, "g-123"));
        exchange.assert_async().await;
    }

    #[tokio::test]
    async fn test_state_mismatch_skips_exchange() {
        let server = MockServer::start_async().await;
        mock_discovery(&server).await;
        let exchange = server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(json!({}));
            })
            .await;

        let result = provider(&server)
            .complete(
                flow("state-1", "nonce-1"),
                &params(&[("state", "forged"), ("code", "auth-code")]),
            )
            .await;

        assert!(matches!(result, Err(AuthError::StateMismatch)));
        assert_eq!(exchange.hits_async().await, 0);
    }

    #[tokio::test]
    async fn test_missing_id_token() {
        let server = MockServer::start_async().await;
        mock_discovery(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(200).json_body(json!({"access_token": "at"}));
            })
            .await;

        let result = provider(&server)
            .complete(flow("s", "n"), &params(&[("state", "s"), ("code", "c")]))
            .await;
        assert!(matches!(result, Err(AuthError::MissingIdToken)));
    }

    #[tokio::test]
    async fn test_exchange_failure() {
        let server = MockServer::start_async().await;
        mock_discovery(&server).await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/token");
                then.status(400).json_body(json!({"error": "invalid_grant"}));
            })
            .await;

        let result = provider(&server)
            .complete(flow("s", "n"), &params(&[("state", "s"), ("code", "c")]))
            .await;
        assert!(matches!(result, Err(AuthError::TokenExchange(_))));
    }

    #[tokio::test]
    async fn test_wrong_audience_and_nonce_rejected() {
        let server = MockServer::start_async().await;
        mock_discovery(&server).await;
        let wrong_aud = id_token(&server, "g-1", "n", "someone-else");
        let wrong_nonce = id_token(&server, "g-1", "other", "client-1");

        for token in [wrong_aud, wrong_nonce] {
            let mut mock = server
                .mock_async(|when, then| {
                    when.method(POST).path("/token");
                    then.status(200).json_body(json!({"id_token": token}));
                })
                .await;

            let result = provider(&server)
                .complete(flow("s", "n"), &params(&[("state", "s"), ("code", "c")]))
                .await;
            assert!(matches!(result, Err(AuthError::IdTokenVerification(_))));
            mock.delete_async().await;
        }
    }

    #[tokio::test]
    async fn test_provider_error_param() {
        let server = MockServer::start_async().await;
        let result = provider(&server)
            .complete(flow("s", "n"), &params(&[("error", "access_denied"), ("state", "s")]))
            .await;
        assert!(matches!(result, Err(AuthError::ProviderDenied(e)) if e == "access_denied"));
    }
}
