//! Session token -> user

use tracing::error;
use uuid::Uuid;

use crate::auth::errors::AuthError;
use crate::auth::storage::{SessionToUserId, TypedStore, UserIdToUser};
use crate::auth::types::User;

pub struct SessionLookup {
    store: TypedStore,
}

impl SessionLookup {
    pub fn new(store: TypedStore) -> Self {
        Self { store }
    }

    /// `Ok(None)` for unknown or malformed tokens. A token whose user record
    /// is missing is a storage invariant violation, not an anonymous caller.
    pub async fn resolve(&self, token: &str) -> Result<Option<User>, AuthError> {
        let Ok(token) = Uuid::parse_str(token.trim()) else {
            return Ok(None);
        };

        let Some(user_id) = self.store.get::<SessionToUserId>(&token.to_string()).await? else {
            return Ok(None);
        };

        match self.store.get::<UserIdToUser>(&user_id.to_string()).await? {
            Some(user) => Ok(Some(user)),
            None => {
                error!(user_id = %user_id, "session refers to a missing user record");
                Err(AuthError::StorageCorruption(format!(
                    "no user record for {}",
                    user_id
                )))
            }
        }
    }
}
