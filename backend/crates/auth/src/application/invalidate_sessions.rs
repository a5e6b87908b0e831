//! Invalidate All Sessions Use Case
//!
//! Deletes every refresh-token session of a user. Access tokens already out
//! stay valid until they expire.

use kernel::id::UserId;

use crate::application::deps::AuthDeps;
use crate::domain::repository::{CacheStore, CredentialStore, Notifier};
use crate::domain::value_object::session_key::SessionKey;
use crate::error::AuthResult;

pub struct InvalidateAllSessionsUseCase<R, C, N> {
    deps: AuthDeps<R, C, N>,
}

impl<R, C, N> InvalidateAllSessionsUseCase<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(deps: AuthDeps<R, C, N>) -> Self {
        Self { deps }
    }

    /// Returns the number of sessions removed
    pub async fn execute(&self, user_id: &UserId) -> AuthResult<u64> {
        let pattern = SessionKey::user_pattern(user_id);
        let removed = self
            .deps
            .critical(
                "delete_sessions",
                self.deps.cache.delete_by_pattern(&pattern),
            )
            .await?;

        tracing::info!(user_id = %user_id, removed, "All sessions invalidated");
        Ok(removed)
    }
}
