//! Session issuance
//!
//! An access/refresh pair is only handed out once the refresh token's
//! session record is stored. If that write fails the pair is dropped, so no
//! refresh token ever exists without its record.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::token::TokenType;

use crate::application::deps::AuthDeps;
use crate::domain::repository::{CacheStore, CredentialStore, Notifier};
use crate::domain::value_object::session_key::SessionKey;
use crate::error::AuthResult;

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl<R, C, N> AuthDeps<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub(crate) async fn start_session(&self, user_id: UserId) -> AuthResult<TokenPair> {
        let access = self.tokens.issue(
            *user_id.as_uuid(),
            TokenType::Access,
            self.config.access_token_ttl,
        )?;
        let refresh = self.tokens.issue(
            *user_id.as_uuid(),
            TokenType::Refresh,
            self.config.refresh_token_ttl,
        )?;

        let key = SessionKey::for_token(&user_id, &refresh.token);
        self.critical(
            "store_session",
            self.cache
                .set(key.as_str(), &user_id.to_string(), self.config.session_ttl()),
        )
        .await?;

        tracing::debug!(user_id = %user_id, jti = %refresh.claims.jti, "Session stored");

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access.claims.exp,
            refresh_expires_at: refresh.claims.exp,
        })
    }
}
