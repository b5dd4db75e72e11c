use crate::api::server_config::*;
use axum::{error_handling::HandleErrorLayer, http::StatusCode, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::{limit::ConcurrencyLimitLayer, timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::auth::{create_auth_routes, AuthConfig, AuthError, AuthService};

/// HTTP front of the login gateway
#[derive(Clone)]
pub struct GatewayServer {
    pub service: Arc<AuthService>,
    pub host: String,
    pub port: u16,
}

impl GatewayServer {
    pub async fn new(config: AuthConfig) -> Result<Self, AuthError> {
        let host = config.host.clone();
        let port = config.port;
        let service = Arc::new(AuthService::from_config(config).await?);
        Ok(Self { service, host, port })
    }

    pub fn from_service(service: Arc<AuthService>) -> Self {
        let host = service.config().host.clone();
        let port = service.config().port;
        Self { service, host, port }
    }

    pub fn create_router(&self) -> Router {
        create_auth_routes(self.service.clone()).layer(
            ServiceBuilder::new()
                // Timeout and overload errors become HTTP responses
                .layer(HandleErrorLayer::new(|err: BoxError| async move {
                    if err.is::<tower::timeout::error::Elapsed>() {
                        (StatusCode::REQUEST_TIMEOUT, "request timed out")
                    } else {
                        (StatusCode::SERVICE_UNAVAILABLE, "service overloaded")
                    }
                }))
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENCY))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(TraceLayer::new_for_http()),
        )
    }

    pub async fn start(self) -> Result<(), anyhow::Error> {
        let providers = self.service.enabled_providers();
        if providers.is_empty() {
            tracing::warn!("no login provider configured, only anonymous pages are served");
        }

        let cleanup = self.service.flows().clone().start_cleanup_task(FLOW_CLEANUP_INTERVAL);

        let app = self.create_router();
        let addr = format!("{}:{}", self.host, self.port);
        tracing::info!("Server listening on {} (providers: {:?})", addr, providers);
        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        cleanup.abort();
        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
