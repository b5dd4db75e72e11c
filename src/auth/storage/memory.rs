//! In-memory storage (volatile, for development and tests)

use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::r#trait::{Bucket, KvStore};
use crate::auth::errors::AuthError;

/// In-memory store, one map per bucket
///
/// Contents are lost on restart and never evicted.
pub struct MemoryStore {
    /// subject key -> user id
    subjects: RwLock<HashMap<String, String>>,

    /// user id -> user
    users: RwLock<HashMap<String, String>>,

    /// session token -> user id
    sessions: RwLock<HashMap<String, String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            subjects: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn bucket(&self, bucket: Bucket) -> &RwLock<HashMap<String, String>> {
        match bucket {
            Bucket::SubjectToUserId => &self.subjects,
            Bucket::UserIdToUser => &self.users,
            Bucket::SessionToUserId => &self.sessions,
        }
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn store(&self, bucket: Bucket, key: &str, value: String) -> Result<(), AuthError> {
        self.bucket(bucket).write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn load(&self, bucket: Bucket, key: &str) -> Result<Option<String>, AuthError> {
        Ok(self.bucket(bucket).read().await.get(key).cloned())
    }

    async fn insert_if_absent(
        &self,
        bucket: Bucket,
        key: &str,
        value: String,
    ) -> Result<Option<String>, AuthError> {
        let mut map = self.bucket(bucket).write().await;
        match map.entry(key.to_string()) {
            Entry::Occupied(existing) => Ok(Some(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(None)
            }
        }
    }

    async fn remove(&self, bucket: Bucket, key: &str) -> Result<bool, AuthError> {
        Ok(self.bucket(bucket).write().await.remove(key).is_some())
    }

    async fn count(&self, bucket: Bucket) -> Result<u64, AuthError> {
        Ok(self.bucket(bucket).read().await.len() as u64)
    }
}
