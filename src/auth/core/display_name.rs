//! Display names for new users
//!
//! Names come from an external phrase service. The service is best effort:
//! a failure or a slow answer never blocks user creation, the configured
//! fallback name is used instead.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::config::DisplayNameConfig;
use crate::auth::errors::AuthError;

/// Source of display names
#[async_trait]
pub trait DisplayNameSource: Send + Sync {
    async fn fetch(&self) -> Result<String, AuthError>;
}

/// HTTP phrase service: one GET, plain-text body
pub struct PhraseService {
    client: reqwest::Client,
    url: String,
}

impl PhraseService {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Config(format!("cannot build http client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DisplayNameSource for PhraseService {
    async fn fetch(&self) -> Result<String, AuthError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AuthError::DisplayName(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::DisplayName(format!("status {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::DisplayName(e.to_string()))?;

        let phrase = body.trim();
        if phrase.is_empty() {
            return Err(AuthError::DisplayName("empty phrase".to_string()));
        }
        Ok(phrase.to_string())
    }
}

/// Name given when neither the service nor the configuration supplies one
pub const DEFAULT_FALLBACK: &str = "anonymous";

/// Display-name factory handed to the resolver
///
/// Bounds every fetch by `timeout` and substitutes `fallback` on failure.
/// A blank `fallback` is replaced by [`DEFAULT_FALLBACK`].
#[derive(Clone)]
pub struct DisplayNames {
    source: Arc<dyn DisplayNameSource>,
    timeout: Duration,
    fallback: String,
}

impl DisplayNames {
    pub fn new(source: Arc<dyn DisplayNameSource>, timeout: Duration, fallback: impl Into<String>) -> Self {
        let fallback = fallback.into();
        let fallback = if fallback.trim().is_empty() {
            warn!("blank fallback display name, using {:?}", DEFAULT_FALLBACK);
            DEFAULT_FALLBACK.to_string()
        } else {
            fallback
        };
        Self {
            source,
            timeout,
            fallback,
        }
    }

    /// Phrase service configured by `config`
    pub fn from_config(config: &DisplayNameConfig) -> Result<Self, AuthError> {
        let service = PhraseService::new(config.url.clone(), config.timeout())?;
        Ok(Self::new(Arc::new(service), config.timeout(), config.fallback.clone()))
    }

    /// Always yields a non-empty name
    pub async fn assign(&self) -> String {
        match tokio::time::timeout(self.timeout, self.source.fetch()).await {
            Ok(Ok(name)) if !name.trim().is_empty() => {
                debug!("display name assigned by service");
                name
            }
            Ok(Ok(_)) => {
                warn!("display name service returned an empty name, using fallback");
                self.fallback.clone()
            }
            Ok(Err(e)) => {
                warn!("display name service failed, using fallback: {}", e);
                self.fallback.clone()
            }
            Err(_) => {
                warn!("display name service timed out after {:?}, using fallback", self.timeout);
                self.fallback.clone()
            }
        }
    }
}
