//! Identity provider adapters

pub mod google;
pub mod oauth1;
pub mod r#trait;
pub mod twitter;

use std::sync::Arc;
use std::time::Duration;

use crate::auth::config::AuthConfig;
use crate::auth::errors::AuthError;
use crate::auth::types::ProviderKind;

pub use google::GoogleProvider;
pub use r#trait::{AuthorizationRequest, CallbackParams, LoginProvider};
pub use twitter::TwitterProvider;

/// Timeout for calls to provider endpoints
pub const PROVIDER_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub fn http_client() -> Result<reqwest::Client, AuthError> {
    reqwest::Client::builder()
        .timeout(PROVIDER_HTTP_TIMEOUT)
        .build()
        .map_err(|e| AuthError::Config(format!("cannot build http client: {}", e)))
}

/// Adapters for every provider that has credentials configured
pub fn from_config(config: &AuthConfig) -> Result<Vec<Arc<dyn LoginProvider>>, AuthError> {
    let http = http_client()?;
    let mut providers: Vec<Arc<dyn LoginProvider>> = Vec::new();

    if let Some(google) = &config.google {
        providers.push(Arc::new(GoogleProvider::new(
            google.clone(),
            config.redirect_uri(ProviderKind::Google),
            http.clone(),
        )));
    }
    if let Some(twitter) = &config.twitter {
        providers.push(Arc::new(TwitterProvider::new(
            twitter.clone(),
            config.redirect_uri(ProviderKind::Twitter),
            http,
        )));
    }
    Ok(providers)
}
