//! Authentication service (facade over flows, providers, resolver and sessions)

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::{
    config::AuthConfig,
    core::{DisplayNameSource, DisplayNames, IdentityResolver, SessionLookup},
    errors::AuthError,
    flow_store::FlowStore,
    providers::{self, CallbackParams, LoginProvider},
    storage::{self, KvStore, TypedStore},
    types::{ProviderKind, ResolvedLogin, User},
};

/// Redirect issued when a login starts
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    /// Provider authorization URL
    pub url: String,
    /// Pending flow id, carried by the browser in a cookie
    pub flow_id: String,
}

/// Authentication service
pub struct AuthService {
    config: AuthConfig,
    store: TypedStore,
    resolver: IdentityResolver,
    sessions: SessionLookup,
    display_names: DisplayNames,
    flows: Arc<FlowStore>,
    providers: HashMap<ProviderKind, Arc<dyn LoginProvider>>,
}

impl AuthService {
    /// Wire the service from its collaborators
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn KvStore>,
        display_names: DisplayNames,
        login_providers: Vec<Arc<dyn LoginProvider>>,
    ) -> Self {
        let store = TypedStore::new(store);
        let providers = login_providers
            .into_iter()
            .map(|p| (p.kind(), p))
            .collect::<HashMap<_, _>>();
        let flows = Arc::new(FlowStore::new(config.flow_ttl()));

        Self {
            resolver: IdentityResolver::new(store.clone()),
            sessions: SessionLookup::new(store.clone()),
            store,
            display_names,
            flows,
            providers,
            config,
        }
    }

    /// Build everything from configuration: store backend, phrase service
    /// and the providers that have credentials
    pub async fn from_config(config: AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;
        let store = storage::open_store(&config.storage).await?;
        let display_names = DisplayNames::from_config(&config.display_name)?;
        let login_providers = providers::from_config(&config)?;

        info!(
            backend = store.backend(),
            providers = ?login_providers.iter().map(|p| p.kind()).collect::<Vec<_>>(),
            "auth service initialized"
        );
        Ok(Self::new(config, store, display_names, login_providers))
    }

    /// Same as [`AuthService::new`] with a custom display-name source
    pub fn with_display_source(
        config: AuthConfig,
        store: Arc<dyn KvStore>,
        source: Arc<dyn DisplayNameSource>,
        login_providers: Vec<Arc<dyn LoginProvider>>,
    ) -> Self {
        let display_names = DisplayNames::new(
            source,
            config.display_name.timeout(),
            config.display_name.fallback.clone(),
        );
        Self::new(config, store, display_names, login_providers)
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn store(&self) -> &TypedStore {
        &self.store
    }

    pub fn flows(&self) -> &Arc<FlowStore> {
        &self.flows
    }

    /// Providers with credentials configured
    pub fn enabled_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.providers.contains_key(kind))
            .collect()
    }

    fn provider(&self, name: &str) -> Result<(ProviderKind, &Arc<dyn LoginProvider>), AuthError> {
        let kind: ProviderKind = name.parse()?;
        self.providers
            .get(&kind)
            .map(|p| (kind, p))
            .ok_or_else(|| AuthError::UnknownProvider(name.to_string()))
    }

    /// Start a login: remember the flow and return the provider redirect
    pub async fn start_login(&self, provider: &str) -> Result<LoginRedirect, AuthError> {
        let (kind, provider) = self.provider(provider)?;
        let request = provider.begin().await?;
        let flow_id = self.flows.insert(request.flow)?;

        debug!(provider = %kind, "login flow started");
        Ok(LoginRedirect {
            url: request.url,
            flow_id,
        })
    }

    /// Finish a login from the provider callback
    ///
    /// The pending flow is consumed before anything else so that a callback
    /// cannot be replayed, whatever its outcome.
    pub async fn finish_login(
        &self,
        provider: &str,
        flow_id: Option<&str>,
        params: &CallbackParams,
    ) -> Result<ResolvedLogin, AuthError> {
        let (kind, provider) = self.provider(provider)?;
        let flow_id = flow_id.ok_or(AuthError::FlowNotFound)?;
        let flow = self.flows.take(flow_id, kind)?;

        let identity = provider.complete(flow, params).await?;
        self.resolver
            .resolve_or_create(&identity, &self.display_names)
            .await
    }

    /// User behind a session token, `None` for anonymous callers
    pub async fn current_user(&self, token: &str) -> Result<Option<User>, AuthError> {
        self.sessions.resolve(token).await
    }
}
