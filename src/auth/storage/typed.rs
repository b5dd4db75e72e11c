//! Typed access to the store: each bucket is bound to its value type

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use super::r#trait::{Bucket, KvStore};
use crate::auth::errors::AuthError;
use crate::auth::types::{User, UserId};

/// Binds a bucket to the type of its values
pub trait BucketSpec {
    const BUCKET: Bucket;
    type Value: Serialize + DeserializeOwned + Send + Sync + 'static;
}

/// `"<provider>:<subject id>"` -> [`UserId`]
pub struct SubjectToUserId;

/// user id -> [`User`]
pub struct UserIdToUser;

/// session token -> [`UserId`]
pub struct SessionToUserId;

impl BucketSpec for SubjectToUserId {
    const BUCKET: Bucket = Bucket::SubjectToUserId;
    type Value = UserId;
}

impl BucketSpec for UserIdToUser {
    const BUCKET: Bucket = Bucket::UserIdToUser;
    type Value = User;
}

impl BucketSpec for SessionToUserId {
    const BUCKET: Bucket = Bucket::SessionToUserId;
    type Value = UserId;
}

/// Serializing wrapper around a [`KvStore`] backend
#[derive(Clone)]
pub struct TypedStore {
    inner: Arc<dyn KvStore>,
}

impl TypedStore {
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        Self { inner }
    }

    pub fn raw(&self) -> &Arc<dyn KvStore> {
        &self.inner
    }

    pub async fn put<B: BucketSpec>(&self, key: &str, value: &B::Value) -> Result<(), AuthError> {
        let doc = serde_json::to_string(value)?;
        self.inner.store(B::BUCKET, key, doc).await
    }

    pub async fn get<B: BucketSpec>(&self, key: &str) -> Result<Option<B::Value>, AuthError> {
        match self.inner.load(B::BUCKET, key).await? {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    /// Conditional write, see [`KvStore::insert_if_absent`]
    pub async fn put_if_absent<B: BucketSpec>(
        &self,
        key: &str,
        value: &B::Value,
    ) -> Result<Option<B::Value>, AuthError> {
        let doc = serde_json::to_string(value)?;
        match self.inner.insert_if_absent(B::BUCKET, key, doc).await? {
            Some(existing) => Ok(Some(serde_json::from_str(&existing)?)),
            None => Ok(None),
        }
    }

    pub async fn delete<B: BucketSpec>(&self, key: &str) -> Result<bool, AuthError> {
        self.inner.remove(B::BUCKET, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MemoryStore;
    use chrono::Utc;

    #[tokio::test]
    async fn test_typed_round_trip() {
        let store = TypedStore::new(Arc::new(MemoryStore::new()));
        let user = User {
            id: UserId::generate(),
            display_name: "brave-otter".to_string(),
            created_at: Utc::now(),
        };

        store.put::<UserIdToUser>(&user.id.to_string(), &user).await.unwrap();
        store.put::<SessionToUserId>("token", &user.id).await.unwrap();

        assert_eq!(store.get::<UserIdToUser>(&user.id.to_string()).await.unwrap(), Some(user.clone()));
        assert_eq!(store.get::<SessionToUserId>("token").await.unwrap(), Some(user.id));
        assert_eq!(store.get::<SubjectToUserId>("google:none").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_document_is_a_storage_error() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .store(Bucket::SessionToUserId, "token", "not json".into())
            .await
            .unwrap();

        let store = TypedStore::new(backend);
        let result = store.get::<SessionToUserId>("token").await;
        assert!(matches!(result, Err(AuthError::Storage(_))));
    }

    #[tokio::test]
    async fn test_put_if_absent_returns_existing() {
        let store = TypedStore::new(Arc::new(MemoryStore::new()));
        let first = UserId::generate();
        let second = UserId::generate();

        assert_eq!(store.put_if_absent::<SubjectToUserId>("google:g", &first).await.unwrap(), None);
        assert_eq!(
            store.put_if_absent::<SubjectToUserId>("google:g", &second).await.unwrap(),
            Some(first)
        );
    }
}
