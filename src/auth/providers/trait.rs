//! Login provider trait

use async_trait::async_trait;
use std::collections::HashMap;

use crate::auth::errors::AuthError;
use crate::auth::flow_store::PendingFlow;
use crate::auth::types::{ExternalIdentity, ProviderKind};

/// Query parameters of a provider callback
pub type CallbackParams = HashMap<String, String>;

/// Where to send the browser, and what to remember until it comes back
#[derive(Debug)]
pub struct AuthorizationRequest {
    pub url: String,
    pub flow: PendingFlow,
}

/// A provider adapter turns a browser round trip into a verified
/// [`ExternalIdentity`]
#[async_trait]
pub trait LoginProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Prepare the provider redirect
    async fn begin(&self) -> Result<AuthorizationRequest, AuthError>;

    /// Validate the callback against the pending flow and identify the user
    async fn complete(
        &self,
        flow: PendingFlow,
        params: &CallbackParams,
    ) -> Result<ExternalIdentity, AuthError>;
}
