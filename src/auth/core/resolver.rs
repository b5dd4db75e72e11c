//! Maps external identities to local users and issues sessions

use chrono::Utc;
use tracing::{info, warn};

use super::display_name::DisplayNames;
use super::locks::KeyedLocks;
use crate::auth::errors::AuthError;
use crate::auth::storage::{SessionToUserId, SubjectToUserId, TypedStore, UserIdToUser};
use crate::auth::types::{ExternalIdentity, ResolvedLogin, SessionToken, User, UserId};

/// Identity resolver
///
/// The first login of an identity creates exactly one user, even when several
/// callbacks for it race. Logins of the same process are serialized by a
/// per-identity lock; the subject index itself is written with a conditional
/// insert so that separate processes sharing one store converge too.
pub struct IdentityResolver {
    store: TypedStore,
    locks: KeyedLocks,
}

impl IdentityResolver {
    pub fn new(store: TypedStore) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Find or create the user behind `identity` and issue a fresh session
    pub async fn resolve_or_create(
        &self,
        identity: &ExternalIdentity,
        display_names: &DisplayNames,
    ) -> Result<ResolvedLogin, AuthError> {
        let subject_key = identity.storage_key();
        let _guard = self.locks.lock(&subject_key).await;

        if let Some(user_id) = self.store.get::<SubjectToUserId>(&subject_key).await? {
            let session_token = self.issue_session(user_id).await?;
            info!(provider = %identity.provider, user_id = %user_id, "returning user signed in");
            return Ok(ResolvedLogin {
                user_id,
                session_token,
                created: false,
            });
        }

        let user = User {
            id: UserId::generate(),
            display_name: display_names.assign().await,
            created_at: Utc::now(),
        };
        // User record first: the subject index must never point at nothing.
        self.store.put::<UserIdToUser>(&user.id.to_string(), &user).await?;

        if let Some(winner) = self
            .store
            .put_if_absent::<SubjectToUserId>(&subject_key, &user.id)
            .await?
        {
            warn!(
                provider = %identity.provider,
                user_id = %winner,
                "identity was claimed concurrently, discarding duplicate user"
            );
            self.store.delete::<UserIdToUser>(&user.id.to_string()).await?;
            let session_token = self.issue_session(winner).await?;
            return Ok(ResolvedLogin {
                user_id: winner,
                session_token,
                created: false,
            });
        }

        let session_token = self.issue_session(user.id).await?;
        info!(
            provider = %identity.provider,
            user_id = %user.id,
            display_name = %user.display_name,
            "new user created"
        );
        Ok(ResolvedLogin {
            user_id: user.id,
            session_token,
            created: true,
        })
    }

    async fn issue_session(&self, user_id: UserId) -> Result<SessionToken, AuthError> {
        let token = SessionToken::generate();
        // A token is never rebound to another user.
        if self
            .store
            .put_if_absent::<SessionToUserId>(&token.to_string(), &user_id)
            .await?
            .is_some()
        {
            return Err(AuthError::Storage("session token collision".to_string()));
        }
        Ok(token)
    }
}
