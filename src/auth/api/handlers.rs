//! Request handlers

use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::cookie_config::{
    create_delete_cookie, create_flow_cookie, create_session_cookie, read_cookie, FLOW_COOKIE,
    FLOW_COOKIE_PATH, SESSION_COOKIE,
};
use crate::auth::{errors::AuthError, providers::CallbackParams, types::User, AuthService};

/// Body of `/` for callers without a valid session
pub const ANONYMOUS_MESSAGE: &str = "No Authorization info found...";

/// Greeting for the signed-in user
pub async fn index(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<String, AuthError> {
    match session_user(&service, &headers).await? {
        Some(user) => Ok(format!("Hello, {}!", user.display_name)),
        None => Ok(ANONYMOUS_MESSAGE.to_string()),
    }
}

/// Current user as JSON
pub async fn get_current_user(
    State(service): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<Json<User>, AuthError> {
    session_user(&service, &headers)
        .await?
        .map(Json)
        .ok_or(AuthError::Unauthenticated)
}

/// Redirect to the provider consent page
pub async fn begin_login(
    State(service): State<Arc<AuthService>>,
    Path(provider): Path<String>,
) -> Result<Response, AuthError> {
    let redirect = service.start_login(&provider).await?;
    info!(provider = %provider, "redirecting to provider");

    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, location(&redirect.url)?);
    create_flow_cookie(
        &redirect.flow_id,
        service.flows().ttl(),
        service.config().cookie.secure,
    )
    .append_to_headers(&mut headers)?;

    Ok((StatusCode::FOUND, headers).into_response())
}

/// Provider callback: finish the login and set the session cookie
pub async fn login_callback(
    State(service): State<Arc<AuthService>>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    let flow_id = read_cookie(&headers, FLOW_COOKIE);
    let result = service
        .finish_login(&provider, flow_id.as_deref(), &params)
        .await;

    let mut response = match result {
        Ok(login) => {
            debug!(provider = %provider, user_id = %login.user_id, "login callback accepted");
            let mut headers = HeaderMap::new();
            headers.insert(LOCATION, HeaderValue::from_static("/"));
            match create_session_cookie(&login.session_token.to_string(), &service.config().cookie)
                .append_to_headers(&mut headers)
            {
                Ok(()) => (StatusCode::FOUND, headers).into_response(),
                Err(e) => e.into_response(),
            }
        }
        Err(e) => {
            warn!(provider = %provider, "login callback rejected: {}", e);
            e.into_response()
        }
    };

    // The flow is consumed either way.
    if flow_id.is_some() {
        if let Err(e) = create_delete_cookie(FLOW_COOKIE, FLOW_COOKIE_PATH)
            .append_to_headers(response.headers_mut())
        {
            warn!("cannot clear flow cookie: {}", e);
        }
    }
    response
}

/// Health check
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn session_user(service: &AuthService, headers: &HeaderMap) -> Result<Option<User>, AuthError> {
    match read_cookie(headers, SESSION_COOKIE) {
        Some(token) => service.current_user(&token).await,
        None => Ok(None),
    }
}

fn location(url: &str) -> Result<HeaderValue, AuthError> {
    HeaderValue::from_str(url)
        .map_err(|e| AuthError::ProviderRequest(format!("invalid redirect url: {}", e)))
}
