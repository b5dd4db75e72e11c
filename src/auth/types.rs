//! Identity and session types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::errors::AuthError;

/// External identity providers this gateway can sign users in with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google, OpenID Connect
    Google,
    /// Twitter, OAuth 1.0a
    Twitter,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Google, ProviderKind::Twitter];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Twitter => "twitter",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(ProviderKind::Google),
            "twitter" => Ok(ProviderKind::Twitter),
            other => Err(AuthError::UnknownProvider(other.to_string())),
        }
    }
}

/// A subject identifier attested by a provider
///
/// The subject id is opaque: it is never parsed, only compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalIdentity {
    pub provider: ProviderKind,
    pub subject_id: String,
}

impl ExternalIdentity {
    pub fn new(provider: ProviderKind, subject_id: impl Into<String>) -> Self {
        Self {
            provider,
            subject_id: subject_id.into(),
        }
    }

    /// Key under which the identity is indexed. The provider prefix keeps
    /// equal subject ids from different providers apart.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.provider, self.subject_id)
    }
}

/// Locally minted user id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque bearer value handed to the browser in the session cookie
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub Uuid);

impl SessionToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// Tokens are bearer credentials, keep them out of debug logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(**redacted**)")
    }
}

/// User record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID
    pub id: UserId,
    /// Display name, assigned once at creation
    pub display_name: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Outcome of a successful login
#[derive(Debug, Clone)]
pub struct ResolvedLogin {
    pub user_id: UserId,
    pub session_token: SessionToken,
    /// True when this login created the user
    pub created: bool,
}
