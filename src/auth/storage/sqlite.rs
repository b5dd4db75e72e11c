//! Persistent storage backed by SQLite
//!
//! All buckets share one `kv_entries` table keyed by `(bucket, key)`. Every
//! write is a single statement, so it is atomic per key.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

use super::r#trait::{Bucket, KvStore};
use crate::auth::errors::AuthError;

/// SQLite-backed store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database and run migrations
    pub async fn connect(database_url: &str) -> Result<Self, AuthError> {
        info!("Opening sqlite store: {}", database_url);

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AuthError::Config(format!("invalid database url {}: {}", database_url, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // An in-memory database only lives as long as its connection.
        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(connect_options).await?;

        sqlx::query(include_str!("../../../migrations/001_create_kv_entries.sql"))
            .execute(&pool)
            .await?;

        let store = Self { pool };
        store.verify_buckets().await?;

        info!("Sqlite store ready");
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Refuse to serve from a table holding rows outside the known buckets
    async fn verify_buckets(&self) -> Result<(), AuthError> {
        let names = sqlx::query_scalar::<_, String>("SELECT DISTINCT bucket FROM kv_entries")
            .fetch_all(&self.pool)
            .await?;

        for name in names {
            name.parse::<Bucket>()?;
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn store(&self, bucket: Bucket, key: &str, value: String) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO kv_entries (bucket, key, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (bucket, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(bucket.as_str())
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, bucket: Bucket, key: &str) -> Result<Option<String>, AuthError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_entries WHERE bucket = ? AND key = ?")
            .bind(bucket.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn insert_if_absent(
        &self,
        bucket: Bucket,
        key: &str,
        value: String,
    ) -> Result<Option<String>, AuthError> {
        let result = sqlx::query(
            "INSERT INTO kv_entries (bucket, key, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (bucket, key) DO NOTHING",
        )
        .bind(bucket.as_str())
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(None);
        }

        match self.load(bucket, key).await? {
            Some(existing) => Ok(Some(existing)),
            None => Err(AuthError::Storage(format!(
                "conditional write on {}/{} lost to a concurrent delete",
                bucket, key
            ))),
        }
    }

    async fn remove(&self, bucket: Bucket, key: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE bucket = ? AND key = ?")
            .bind(bucket.as_str())
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, bucket: Bucket) -> Result<u64, AuthError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM kv_entries WHERE bucket = ?")
            .bind(bucket.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_all_buckets() {
        let store = memory_store().await;

        for bucket in Bucket::ALL {
            store.store(bucket, "key", "\"hogehoge\"".into()).await.unwrap();
            assert_eq!(
                store.load(bucket, "key").await.unwrap().as_deref(),
                Some("\"hogehoge\"")
            );
            assert!(store.load(bucket, "unused").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_sqlite_overwrite_is_visible() {
        let store = memory_store().await;

        store.store(Bucket::UserIdToUser, "u1", "1".into()).await.unwrap();
        store.store(Bucket::UserIdToUser, "u1", "2".into()).await.unwrap();

        assert_eq!(store.load(Bucket::UserIdToUser, "u1").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.count(Bucket::UserIdToUser).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_insert_if_absent() {
        let store = memory_store().await;

        assert!(store
            .insert_if_absent(Bucket::SubjectToUserId, "twitter:42", "\"a\"".into())
            .await
            .unwrap()
            .is_none());
        let existing = store
            .insert_if_absent(Bucket::SubjectToUserId, "twitter:42", "\"b\"".into())
            .await
            .unwrap();
        assert_eq!(existing.as_deref(), Some("\"a\""));
    }

    #[tokio::test]
    async fn test_sqlite_remove() {
        let store = memory_store().await;
        store.store(Bucket::SessionToUserId, "t", "\"u\"".into()).await.unwrap();

        assert!(store.remove(Bucket::SessionToUserId, "t").await.unwrap());
        assert!(!store.remove(Bucket::SessionToUserId, "t").await.unwrap());
        assert_eq!(store.count(Bucket::SessionToUserId).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sqlite_rejects_foreign_bucket_rows() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("kv.db").display());

        {
            let store = SqliteStore::connect(&url).await.unwrap();
            sqlx::query(
                "INSERT INTO kv_entries (bucket, key, value, updated_at) VALUES ('userIDByIDToken', 'k', '1', '')",
            )
            .execute(store.pool())
            .await
            .unwrap();
            store.pool().close().await;
        }

        let result = SqliteStore::connect(&url).await;
        assert!(matches!(result, Err(AuthError::UnknownBucket(ref n)) if n == "userIDByIDToken"));
    }
}
