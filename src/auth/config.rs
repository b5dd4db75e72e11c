//! Gateway configuration

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::auth::errors::AuthError;
use crate::auth::types::ProviderKind;

/// Default endpoint of the random phrase service used for display names
pub const DEFAULT_DISPLAY_NAME_URL: &str = "https://strongest-mashimashi.appspot.com/api/v1/phrase";

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Public base URL, callback URLs are derived from it
    pub serving_url: String,

    /// Google sign-in, disabled when absent
    pub google: Option<GoogleConfig>,

    /// Twitter sign-in, disabled when absent
    pub twitter: Option<TwitterConfig>,

    /// Display-name collaborator
    pub display_name: DisplayNameConfig,

    /// Store backend
    pub storage: StorageConfig,

    /// Lifetime of a pending login flow (seconds)
    pub flow_ttl_secs: u64,

    /// Session cookie flags
    pub cookie: CookieConfig,
}

/// Google OpenID Connect client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,

    /// Issuer, discovery document lives under it
    #[serde(default = "GoogleConfig::default_issuer")]
    pub issuer_url: String,

    /// ID token signature algorithms accepted
    #[serde(default = "GoogleConfig::default_algorithms")]
    pub id_token_algorithms: Vec<Algorithm>,
}

/// Twitter OAuth 1.0a consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    pub consumer_key: String,
    pub consumer_secret: String,

    /// API base, e.g. `https://api.twitter.com`
    #[serde(default = "TwitterConfig::default_api_base")]
    pub api_base: String,
}

/// Display-name service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayNameConfig {
    pub url: String,

    /// Request timeout (milliseconds)
    pub timeout_ms: u64,

    /// Name assigned when the service fails
    pub fallback: String,
}

/// Store backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Volatile maps
    Memory,
    /// SQLite file
    Sqlite { database_url: String },
}

/// Session cookie hardening flags, off in the baseline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub secure: bool,
    pub http_only: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            serving_url: "http://localhost:8080".to_string(),
            google: None,
            twitter: None,
            display_name: DisplayNameConfig::default(),
            storage: StorageConfig::default(),
            flow_ttl_secs: 600,
            cookie: CookieConfig::default(),
        }
    }
}

impl Default for DisplayNameConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DISPLAY_NAME_URL.to_string(),
            timeout_ms: 3000,
            fallback: "anonymous".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory
    }
}

impl GoogleConfig {
    fn default_issuer() -> String {
        "https://accounts.google.com".to_string()
    }

    fn default_algorithms() -> Vec<Algorithm> {
        vec![Algorithm::RS256]
    }

    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            issuer_url: Self::default_issuer(),
            id_token_algorithms: Self::default_algorithms(),
        }
    }

    fn from_env() -> Option<Self> {
        let client_id = non_empty_env("GOOGLE_OAUTH2_CLIENT_ID")?;
        let client_secret = non_empty_env("GOOGLE_OAUTH2_CLIENT_SECRET")?;
        let mut config = Self::new(client_id, client_secret);
        if let Some(issuer) = non_empty_env("GOOGLE_ISSUER_URL") {
            config.issuer_url = issuer;
        }
        Some(config)
    }
}

impl TwitterConfig {
    fn default_api_base() -> String {
        "https://api.twitter.com".to_string()
    }

    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            api_base: Self::default_api_base(),
        }
    }

    fn from_env() -> Option<Self> {
        let key = non_empty_env("TWITTER_API_TOKEN")?;
        let secret = non_empty_env("TWITTER_API_SECRET")?;
        let mut config = Self::new(key, secret);
        if let Some(base) = non_empty_env("TWITTER_API_BASE") {
            config.api_base = base;
        }
        Some(config)
    }
}

impl DisplayNameConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: non_empty_env("DISPLAY_NAME_URL").unwrap_or(defaults.url),
            timeout_ms: parse_env("DISPLAY_NAME_TIMEOUT_MS").unwrap_or(defaults.timeout_ms),
            fallback: non_empty_env("FALLBACK_DISPLAY_NAME").unwrap_or(defaults.fallback),
        }
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, AuthError> {
        match non_empty_env("STORAGE_BACKEND").as_deref() {
            None | Some("memory") => Ok(StorageConfig::Memory),
            Some("sqlite") => Ok(StorageConfig::Sqlite {
                database_url: non_empty_env("DATABASE_URL")
                    .unwrap_or_else(|| "sqlite://./hashira-auth.db".to_string()),
            }),
            Some(other) => Err(AuthError::Config(format!("unknown STORAGE_BACKEND: {}", other))),
        }
    }
}

impl AuthConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, AuthError> {
        let defaults = Self::default();
        let config = Self {
            host: non_empty_env("HOST").unwrap_or(defaults.host),
            port: parse_env("PORT").unwrap_or(defaults.port),
            serving_url: non_empty_env("SERVING_URL").unwrap_or(defaults.serving_url),
            google: GoogleConfig::from_env(),
            twitter: TwitterConfig::from_env(),
            display_name: DisplayNameConfig::from_env(),
            storage: StorageConfig::from_env()?,
            flow_ttl_secs: parse_env("FLOW_TTL_SECS").unwrap_or(defaults.flow_ttl_secs),
            cookie: CookieConfig {
                secure: parse_env("COOKIE_SECURE").unwrap_or(false),
                http_only: parse_env("COOKIE_HTTP_ONLY").unwrap_or(false),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, AuthError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| AuthError::Config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// File when given, environment otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, AuthError> {
        match path {
            Some(path) => Self::from_toml_file(path),
            None => Self::from_env(),
        }
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        url::Url::parse(&self.serving_url)
            .map_err(|e| AuthError::Config(format!("invalid serving_url {}: {}", self.serving_url, e)))?;
        if self.flow_ttl_secs == 0 {
            return Err(AuthError::Config("flow_ttl_secs must be positive".to_string()));
        }
        if self.display_name.timeout_ms == 0 {
            return Err(AuthError::Config("display_name.timeout_ms must be positive".to_string()));
        }
        if self.display_name.fallback.trim().is_empty() {
            return Err(AuthError::Config("display_name.fallback must not be empty".to_string()));
        }
        if let Some(google) = &self.google {
            if google.id_token_algorithms.is_empty() {
                return Err(AuthError::Config("google.id_token_algorithms is empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn flow_ttl(&self) -> Duration {
        Duration::from_secs(self.flow_ttl_secs)
    }

    /// Callback URL registered with the provider
    pub fn redirect_uri(&self, provider: ProviderKind) -> String {
        format!(
            "{}/auth/{}/callback",
            self.serving_url.trim_end_matches('/'),
            provider
        )
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
