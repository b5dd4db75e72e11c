//! Pending login flows
//!
//! Between redirecting the browser to a provider and receiving its callback
//! the gateway keeps per-flow secrets here: the anti-forgery state and nonce
//! for Google, the request token pair for Twitter. The browser only carries
//! the flow id in a short-lived cookie. Flows are single use and expire.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::core::random::random_token;
use crate::auth::errors::AuthError;
use crate::auth::types::ProviderKind;

/// Upper bound on concurrently pending flows
pub const MAX_PENDING_FLOWS: usize = 10_000;

/// Provider-specific secrets of a pending flow
#[derive(Clone)]
pub enum FlowSecret {
    Google { state: String, nonce: String },
    Twitter { request_token: String, request_token_secret: String },
}

impl std::fmt::Debug for FlowSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowSecret::Google { .. } => f.write_str("FlowSecret::Google(**redacted**)"),
            FlowSecret::Twitter { .. } => f.write_str("FlowSecret::Twitter(**redacted**)"),
        }
    }
}

/// A login waiting for its provider callback
#[derive(Debug, Clone)]
pub struct PendingFlow {
    pub provider: ProviderKind,
    pub secret: FlowSecret,
    pub created_at: Instant,
}

impl PendingFlow {
    pub fn new(provider: ProviderKind, secret: FlowSecret) -> Self {
        Self {
            provider,
            secret,
            created_at: Instant::now(),
        }
    }
}

/// In-memory store of pending flows, keyed by flow id
pub struct FlowStore {
    flows: RwLock<HashMap<String, PendingFlow>>,
    ttl: Duration,
    capacity: usize,
}

impl FlowStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_PENDING_FLOWS)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        Self {
            flows: RwLock::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register a flow and return its id. A full store sheds expired flows
    /// first and then refuses new ones, pending logins are never evicted.
    pub fn insert(&self, flow: PendingFlow) -> Result<String, AuthError> {
        let mut flows = self.flows.write();

        if flows.len() >= self.capacity {
            let now = Instant::now();
            flows.retain(|_, f| now.duration_since(f.created_at) <= self.ttl);
            if flows.len() >= self.capacity {
                warn!(capacity = self.capacity, "pending flow capacity reached, refusing new login");
                return Err(AuthError::TooManyFlows);
            }
        }

        let flow_id = random_token(32);
        flows.insert(flow_id.clone(), flow);
        Ok(flow_id)
    }

    /// Remove and return the flow. A flow can be taken once; expired flows
    /// and flows started for another provider are rejected.
    pub fn take(&self, flow_id: &str, provider: ProviderKind) -> Result<PendingFlow, AuthError> {
        let flow = self
            .flows
            .write()
            .remove(flow_id)
            .ok_or(AuthError::FlowNotFound)?;

        if flow.created_at.elapsed() > self.ttl {
            debug!(provider = %flow.provider, "pending flow expired");
            return Err(AuthError::FlowExpired);
        }
        if flow.provider != provider {
            debug!(expected = %provider, actual = %flow.provider, "flow belongs to another provider");
            return Err(AuthError::FlowNotFound);
        }
        Ok(flow)
    }

    pub fn len(&self) -> usize {
        self.flows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired flows, returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let mut flows = self.flows.write();
        let before = flows.len();
        flows.retain(|_, f| f.created_at.elapsed() <= self.ttl);
        before - flows.len()
    }

    /// Periodic cleanup in the background
    pub fn start_cleanup_task(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let cleaned = self.cleanup_expired();
                if cleaned > 0 {
                    info!("Flow cleanup: removed {} expired login flows", cleaned);
                }
            }
        })
    }
}
