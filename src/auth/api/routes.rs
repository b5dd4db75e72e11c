//! Route table

use axum::{routing::get, Router};
use std::sync::Arc;

use super::handlers;
use crate::auth::AuthService;

/// Login, callback and session routes
pub fn create_auth_routes(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/auth/:provider", get(handlers::begin_login))
        .route("/auth/:provider/callback", get(handlers::login_callback))
        .route("/api/me", get(handlers::get_current_user))
        .route("/health", get(handlers::health))
        .with_state(service)
}
