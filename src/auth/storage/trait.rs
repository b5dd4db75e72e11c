//! Storage trait definitions

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::auth::errors::AuthError;

/// Named partition of the key-value store
///
/// The set is closed. Any other name is a programming error and fails with
/// [`AuthError::UnknownBucket`] when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// `"<provider>:<subject id>"` -> user id
    SubjectToUserId,
    /// user id -> user record
    UserIdToUser,
    /// session token -> user id
    SessionToUserId,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [
        Bucket::SubjectToUserId,
        Bucket::UserIdToUser,
        Bucket::SessionToUserId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::SubjectToUserId => "subjectToUserId",
            Bucket::UserIdToUser => "userIdToUser",
            Bucket::SessionToUserId => "sessionToUserId",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| AuthError::UnknownBucket(s.to_string()))
    }
}

/// Bucketed key-value backend
///
/// Values are opaque JSON documents; [`super::TypedStore`] gives them types.
/// Every write is atomic per key and a `load` observes the latest successful
/// write to the same key.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Backend name for logs
    fn backend(&self) -> &'static str;

    /// Insert or overwrite
    async fn store(&self, bucket: Bucket, key: &str, value: String) -> Result<(), AuthError>;

    /// Latest value for the key
    async fn load(&self, bucket: Bucket, key: &str) -> Result<Option<String>, AuthError>;

    /// Write only if the key is free. Returns the value already present when
    /// the key is taken, `None` when this call wrote it.
    async fn insert_if_absent(
        &self,
        bucket: Bucket,
        key: &str,
        value: String,
    ) -> Result<Option<String>, AuthError>;

    /// Delete one key, returns whether it existed
    async fn remove(&self, bucket: Bucket, key: &str) -> Result<bool, AuthError>;

    /// Number of entries in the bucket
    async fn count(&self, bucket: Bucket) -> Result<u64, AuthError>;
}
