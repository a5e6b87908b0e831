//! Refresh Token Use Case
//!
//! Refresh tokens are single use. The old session record is consumed with an
//! atomic take, so of two concurrent replays exactly one gets a new pair.

use kernel::id::UserId;
use platform::token::TokenType;

use crate::application::deps::AuthDeps;
use crate::application::session::TokenPair;
use crate::domain::repository::{CacheStore, CredentialStore, Notifier, UserRepository};
use crate::domain::value_object::session_key::SessionKey;
use crate::error::{AuthError, AuthResult};

pub struct RefreshTokenUseCase<R, C, N> {
    deps: AuthDeps<R, C, N>,
}

impl<R, C, N> RefreshTokenUseCase<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(deps: AuthDeps<R, C, N>) -> Self {
        Self { deps }
    }

    pub async fn execute(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let deps = &self.deps;

        let claims = deps.tokens.verify_as(refresh_token, TokenType::Refresh)?;
        let user_id = UserId::from_uuid(claims.sub);

        let key = SessionKey::for_token(&user_id, refresh_token);
        let consumed = deps
            .critical("consume_session", deps.cache.take(key.as_str()))
            .await?;
        if consumed.is_none() {
            tracing::warn!(user_id = %user_id, jti = %claims.jti, "Refresh token without live session");
            return Err(AuthError::SessionNotFound);
        }

        // The account may have been removed since the token was issued
        if deps
            .bounded("find_user_by_id", deps.repo.find_by_id(&user_id))
            .await?
            .is_none()
        {
            return Err(AuthError::SessionNotFound);
        }

        let tokens = deps.start_session(user_id).await?;

        tracing::info!(user_id = %user_id, "Session refreshed");

        Ok(tokens)
    }
}
