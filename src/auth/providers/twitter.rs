//! Twitter sign-in (OAuth 1.0a three-legged flow)

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use url::Url;

use super::oauth1::{OAuth1Signer, TokenPair};
use super::r#trait::{AuthorizationRequest, CallbackParams, LoginProvider};
use crate::auth::config::TwitterConfig;
use crate::auth::errors::AuthError;
use crate::auth::flow_store::{FlowSecret, PendingFlow};
use crate::auth::types::{ExternalIdentity, ProviderKind};

const REQUEST_TOKEN_PATH: &str = "/oauth/request_token";
const AUTHENTICATE_PATH: &str = "/oauth/authenticate";
const ACCESS_TOKEN_PATH: &str = "/oauth/access_token";
const VERIFY_CREDENTIALS_PATH: &str = "/1.1/account/verify_credentials.json";
const VERIFY_CREDENTIALS_PARAMS: [(&str, &str); 2] =
    [("include_entities", "true"), ("skip_status", "true")];

#[derive(Debug, Deserialize)]
struct VerifiedAccount {
    id_str: String,
}

/// Twitter provider
pub struct TwitterProvider {
    config: TwitterConfig,
    redirect_uri: String,
    http: reqwest::Client,
    signer: OAuth1Signer,
}

impl TwitterProvider {
    pub fn new(config: TwitterConfig, redirect_uri: impl Into<String>, http: reqwest::Client) -> Self {
        let signer = OAuth1Signer::new(config.consumer_key.clone(), config.consumer_secret.clone());
        Self {
            config,
            redirect_uri: redirect_uri.into(),
            http,
            signer,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// POST a signed request and parse the form-encoded token response
    async fn token_request(
        &self,
        path: &str,
        token: Option<TokenPair<'_>>,
        oauth_params: &[(&str, &str)],
    ) -> Result<HashMap<String, String>, AuthError> {
        let url = self.endpoint(path);
        let authorization = self.signer.authorization("POST", &url, token, oauth_params, &[])?;

        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| AuthError::ProviderRequest(format!("{}: {}", path, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::ProviderRequest(format!("{}: {}", path, e)))?;
        if !status.is_success() {
            return Err(AuthError::ProviderRequest(format!("{}: status {}: {}", path, status, body)));
        }

        Ok(url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect())
    }

    async fn request_token(&self) -> Result<(String, String), AuthError> {
        let fields = self
            .token_request(REQUEST_TOKEN_PATH, None, &[("oauth_callback", self.redirect_uri.as_str())])
            .await?;

        if fields.get("oauth_callback_confirmed").map(String::as_str) != Some("true") {
            return Err(AuthError::ProviderRequest("callback not confirmed".to_string()));
        }
        match (fields.get("oauth_token"), fields.get("oauth_token_secret")) {
            (Some(token), Some(secret)) => Ok((token.clone(), secret.clone())),
            _ => Err(AuthError::ProviderRequest("request token missing".to_string())),
        }
    }

    async fn access_token(
        &self,
        request_token: &str,
        request_token_secret: &str,
        verifier: &str,
    ) -> Result<(String, String), AuthError> {
        let token = TokenPair {
            token: request_token,
            secret: request_token_secret,
        };
        let fields = self
            .token_request(ACCESS_TOKEN_PATH, Some(token), &[("oauth_verifier", verifier)])
            .await
            .map_err(|e| match e {
                AuthError::ProviderRequest(msg) => AuthError::TokenExchange(msg),
                other => other,
            })?;

        match (fields.get("oauth_token"), fields.get("oauth_token_secret")) {
            (Some(token), Some(secret)) => Ok((token.clone(), secret.clone())),
            _ => Err(AuthError::TokenExchange("access token missing".to_string())),
        }
    }

    /// Numeric account id of the token owner, as a string
    async fn verify_credentials(&self, token: TokenPair<'_>) -> Result<String, AuthError> {
        let url = self.endpoint(VERIFY_CREDENTIALS_PATH);
        let authorization =
            self.signer
                .authorization("GET", &url, Some(token), &[], &VERIFY_CREDENTIALS_PARAMS)?;

        let response = self
            .http
            .get(&url)
            .query(&VERIFY_CREDENTIALS_PARAMS)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| AuthError::ProviderRequest(format!("verify_credentials: {}", e)))?;
        if !response.status().is_success() {
            return Err(AuthError::ProviderRequest(format!(
                "verify_credentials: status {}",
                response.status()
            )));
        }

        let account: VerifiedAccount = response
            .json()
            .await
            .map_err(|e| AuthError::ProviderRequest(format!("verify_credentials: {}", e)))?;
        if account.id_str.is_empty() {
            return Err(AuthError::ProviderRequest("verify_credentials: empty id".to_string()));
        }
        Ok(account.id_str)
    }
}

#[async_trait]
impl LoginProvider for TwitterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Twitter
    }

    async fn begin(&self) -> Result<AuthorizationRequest, AuthError> {
        let (request_token, request_token_secret) = self.request_token().await?;

        let url = Url::parse_with_params(
            &self.endpoint(AUTHENTICATE_PATH),
            &[("oauth_token", request_token.as_str())],
        )
        .map_err(|e| AuthError::ProviderRequest(format!("authenticate url: {}", e)))?;

        debug!("twitter request token obtained");
        Ok(AuthorizationRequest {
            url: url.into(),
            flow: PendingFlow::new(
                ProviderKind::Twitter,
                FlowSecret::Twitter {
                    request_token,
                    request_token_secret,
                },
            ),
        })
    }

    async fn complete(
        &self,
        flow: PendingFlow,
        params: &CallbackParams,
    ) -> Result<ExternalIdentity, AuthError> {
        let FlowSecret::Twitter {
            request_token,
            request_token_secret,
        } = flow.secret
        else {
            return Err(AuthError::FlowNotFound);
        };

        if params.contains_key("denied") {
            return Err(AuthError::ProviderDenied("denied".to_string()));
        }

        let token_ok = params
            .get("oauth_token")
            .map(|t| bool::from(t.as_bytes().ct_eq(request_token.as_bytes())))
            .unwrap_or(false);
        if !token_ok {
            warn!("twitter callback token did not match the pending flow");
            return Err(AuthError::StateMismatch);
        }

        let verifier = params
            .get("oauth_verifier")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AuthError::ProviderDenied("missing oauth_verifier".to_string()))?;

        let (access_token, access_token_secret) = self
            .access_token(&request_token, &request_token_secret, verifier)
            .await?;
        let subject_id = self
            .verify_credentials(TokenPair {
                token: &access_token,
                secret: &access_token_secret,
            })
            .await?;

        Ok(ExternalIdentity::new(ProviderKind::Twitter, subject_id))
    }
}
