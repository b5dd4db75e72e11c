//! Storage abstraction
//!
//! Bucketed key-value interface with volatile and persistent backends

pub mod r#trait;
pub mod memory;
pub mod sqlite;
pub mod typed;

use std::sync::Arc;

use crate::auth::config::StorageConfig;
use crate::auth::errors::AuthError;

pub use memory::MemoryStore;
pub use r#trait::{Bucket, KvStore};
pub use sqlite::SqliteStore;
pub use typed::{BucketSpec, SessionToUserId, SubjectToUserId, TypedStore, UserIdToUser};

/// Build the backend selected by configuration
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn KvStore>, AuthError> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageConfig::Sqlite { database_url } => {
            Ok(Arc::new(SqliteStore::connect(database_url).await?))
        }
    }
}
