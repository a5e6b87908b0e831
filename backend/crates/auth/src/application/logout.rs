//! Logout Use Case

use kernel::id::UserId;
use platform::token::TokenType;

use crate::application::deps::AuthDeps;
use crate::domain::repository::{CacheStore, CredentialStore, Notifier};
use crate::domain::value_object::session_key::SessionKey;
use crate::error::AuthResult;

pub struct LogoutUseCase<R, C, N> {
    deps: AuthDeps<R, C, N>,
}

impl<R, C, N> LogoutUseCase<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(deps: AuthDeps<R, C, N>) -> Self {
        Self { deps }
    }

    /// Drop the session behind `refresh_token`
    ///
    /// Idempotent. A token that no longer verifies has no session worth
    /// deleting (its record expires with it), so that is not an error either.
    pub async fn execute(&self, refresh_token: &str) -> AuthResult<()> {
        let deps = &self.deps;

        let claims = match deps.tokens.verify_as(refresh_token, TokenType::Refresh) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Logout with unusable refresh token");
                return Ok(());
            }
        };

        let user_id = UserId::from_uuid(claims.sub);
        let key = SessionKey::for_token(&user_id, refresh_token);
        let removed = deps
            .bounded("delete_session", deps.cache.delete(key.as_str()))
            .await?;

        tracing::info!(user_id = %user_id, removed, "User logged out");
        Ok(())
    }
}
