//! Email Verification Use Case
//!
//! Verification tokens are self-contained signed tokens; nothing is stored.

use kernel::id::UserId;
use platform::client::ClientInfo;
use platform::token::TokenType;

use crate::application::deps::AuthDeps;
use crate::domain::entity::{security_event::SecurityEventType, user::User};
use crate::domain::repository::{CacheStore, CredentialStore, Notifier, UserRepository};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

pub struct EmailVerificationUseCase<R, C, N> {
    deps: AuthDeps<R, C, N>,
}

impl<R, C, N> EmailVerificationUseCase<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(deps: AuthDeps<R, C, N>) -> Self {
        Self { deps }
    }

    /// Issue a fresh verification token and mail it
    ///
    /// Returns false when the address is already verified (nothing sent).
    pub async fn send_verification_email(&self, user: &User) -> AuthResult<bool> {
        if user.email_verified {
            return Ok(false);
        }

        let issued = self.deps.tokens.issue(
            *user.user_id.as_uuid(),
            TokenType::Verification,
            self.deps.config.verification_token_ttl,
        )?;

        self.deps
            .bounded(
                "send_verification_email",
                self.deps.notifier.send_verification_email(user, &issued.token),
            )
            .await?;

        tracing::info!(user_id = %user.user_id, "Verification email sent");
        Ok(true)
    }

    /// Resend by address
    ///
    /// Always succeeds for a well-formed address so the response does not
    /// reveal whether an account exists.
    pub async fn resend_verification(&self, email: &str) -> AuthResult<()> {
        let email = Email::new(email)?;
        let user = self
            .deps
            .bounded("find_user_by_email", self.deps.repo.find_by_email(&email))
            .await?;

        let Some(user) = user else {
            tracing::debug!("Verification resend for unknown address");
            return Ok(());
        };

        if let Err(e) = self.send_verification_email(&user).await {
            tracing::warn!(user_id = %user.user_id, error = %e, "Verification resend failed");
        }
        Ok(())
    }

    /// Mark the token's subject verified
    ///
    /// Returns false if the account was already verified; that is not an error.
    pub async fn verify_email(&self, token: &str, client: &ClientInfo) -> AuthResult<bool> {
        let deps = &self.deps;

        let claims = deps.tokens.verify_as(token, TokenType::Verification)?;
        let user_id = UserId::from_uuid(claims.sub);

        let mut user = deps
            .bounded("find_user_by_id", deps.repo.find_by_id(&user_id))
            .await?
            .ok_or(AuthError::TokenMalformed)?;

        if !user.mark_email_verified(deps.now()) {
            tracing::debug!(user_id = %user_id, "Email already verified");
            return Ok(false);
        }

        deps.bounded("update_user", deps.repo.update(&user)).await?;

        deps.monitor()
            .log_event(
                user_id,
                SecurityEventType::EmailVerified,
                client,
                "Email address verified",
            )
            .await;

        tracing::info!(user_id = %user_id, "Email verified");
        Ok(true)
    }
}
