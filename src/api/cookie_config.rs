//! Cookie configuration
//!
//! Builds the `Set-Cookie` values of the gateway (session cookie and the
//! short-lived login-flow cookie) and reads cookies back from requests.

use axum::http::header::{HeaderValue, COOKIE, SET_COOKIE};
use axum::http::HeaderMap;
use cookie::Cookie;
use std::time::Duration;

use crate::auth::config::CookieConfig;
use crate::auth::errors::AuthError;

/// Session cookie name
pub const SESSION_COOKIE: &str = "Authorization";

/// Pending login flow cookie name
pub const FLOW_COOKIE: &str = "oauth_flow";

/// Flow cookie is only sent back to the login routes
pub const FLOW_COOKIE_PATH: &str = "/auth";

/// Cookie attributes
#[derive(Debug, Clone)]
pub struct SecureCookieConfig {
    pub name: String,
    pub value: String,
    pub path: String,
    /// Max-Age in seconds, `None` for a browser-session cookie
    pub max_age: Option<i64>,
    pub http_only: bool,
    /// HTTPS only
    pub secure: bool,
}

impl Default for SecureCookieConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            value: String::new(),
            path: "/".to_string(),
            max_age: None,
            http_only: true,
            secure: false,
        }
    }
}

impl SecureCookieConfig {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_max_age(mut self, max_age: i64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// `Set-Cookie` value
    pub fn build(&self) -> String {
        let mut cookie = format!("{}={}; Path={}", self.name, self.value, self.path);

        if let Some(max_age) = self.max_age {
            cookie.push_str(&format!("; Max-Age={}", max_age));
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        // Lax: still sent on the top-level redirect back from the provider
        cookie.push_str("; SameSite=Lax");

        cookie
    }

    /// Append as a `Set-Cookie` header, keeping cookies already set
    pub fn append_to_headers(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        let header_value = HeaderValue::from_str(&self.build())
            .map_err(|e| AuthError::Config(format!("invalid cookie value: {}", e)))?;
        headers.append(SET_COOKIE, header_value);
        Ok(())
    }
}

/// Session cookie: `Path=/`, no expiry, flags from configuration
pub fn create_session_cookie(session_token: &str, config: &CookieConfig) -> SecureCookieConfig {
    SecureCookieConfig::new(SESSION_COOKIE, session_token)
        .with_http_only(config.http_only)
        .with_secure(config.secure)
        .with_path("/")
}

/// Flow cookie living as long as the pending flow
pub fn create_flow_cookie(flow_id: &str, ttl: Duration, secure: bool) -> SecureCookieConfig {
    SecureCookieConfig::new(FLOW_COOKIE, flow_id)
        .with_max_age(ttl.as_secs() as i64)
        .with_http_only(true)
        .with_secure(secure)
        .with_path(FLOW_COOKIE_PATH)
}

/// Expired cookie that makes the browser drop `name` at `path`
pub fn create_delete_cookie(name: &str, path: &str) -> SecureCookieConfig {
    SecureCookieConfig::new(name, "")
        .with_max_age(0)
        .with_http_only(true)
        .with_path(path)
}

/// Value of cookie `name` from the request `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}
