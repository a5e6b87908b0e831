//! Password Reset and Change Use Cases
//!
//! Both end every session of the account. A reset token issued before the
//! latest password change is refused, and the new password is written only
//! if no other change landed since it was read, which makes reset tokens
//! single use even under concurrent submission.

use kernel::id::UserId;
use platform::client::ClientInfo;
use platform::password::ClearTextPassword;
use platform::token::TokenType;

use crate::application::deps::AuthDeps;
use crate::application::invalidate_sessions::InvalidateAllSessionsUseCase;
use crate::domain::entity::{security_event::SecurityEventType, user::User};
use crate::domain::repository::{CacheStore, CredentialStore, Notifier, UserRepository};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

pub struct ResetPasswordInput {
    pub token: String,
    pub new_password: String,
}

pub struct ChangePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

pub struct PasswordUseCase<R, C, N> {
    deps: AuthDeps<R, C, N>,
}

impl<R, C, N> PasswordUseCase<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(deps: AuthDeps<R, C, N>) -> Self {
        Self { deps }
    }

    /// Mail a reset link if the address belongs to an account
    ///
    /// The outcome is the same either way. Only a malformed address is
    /// rejected.
    pub async fn request_password_reset(&self, email: &str, client: &ClientInfo) -> AuthResult<()> {
        let deps = &self.deps;
        let email = Email::new(email)?;

        let user = deps
            .bounded("find_user_by_email", deps.repo.find_by_email(&email))
            .await?;
        let Some(user) = user else {
            tracing::debug!("Password reset requested for unknown address");
            return Ok(());
        };

        let issued = match deps.tokens.issue(
            *user.user_id.as_uuid(),
            TokenType::PasswordReset,
            deps.config.password_reset_token_ttl,
        ) {
            Ok(issued) => issued,
            Err(e) => {
                tracing::error!(user_id = %user.user_id, error = %e, "Could not issue reset token");
                return Ok(());
            }
        };

        deps.best_effort(
            "send_password_reset_email",
            deps.notifier.send_password_reset_email(&user, &issued.token),
        )
        .await;

        deps.monitor()
            .log_event(
                user.user_id,
                SecurityEventType::PasswordResetRequested,
                client,
                "Password reset requested",
            )
            .await;

        tracing::info!(user_id = %user.user_id, "Password reset requested");
        Ok(())
    }

    pub async fn reset_password(
        &self,
        input: ResetPasswordInput,
        client: &ClientInfo,
    ) -> AuthResult<()> {
        let deps = &self.deps;

        let claims = deps.tokens.verify_as(&input.token, TokenType::PasswordReset)?;
        let password = ClearTextPassword::new(input.new_password)?;

        let mut user = deps
            .bounded(
                "find_user_by_id",
                deps.repo.find_by_id(&UserId::from_uuid(claims.sub)),
            )
            .await?
            .ok_or(AuthError::TokenMalformed)?;

        if user.is_stale_for_password_reset(claims.iat) {
            tracing::warn!(user_id = %user.user_id, jti = %claims.jti, "Reused or stale reset token");
            return Err(AuthError::TokenExpired);
        }

        if !self.replace_password(&mut user, &password).await? {
            tracing::warn!(user_id = %user.user_id, jti = %claims.jti, "Reset token lost to a concurrent password change");
            return Err(AuthError::TokenExpired);
        }

        deps.monitor()
            .log_event(
                user.user_id,
                SecurityEventType::PasswordReset,
                client,
                "Password reset via emailed link",
            )
            .await;
        self.after_password_change(&user, client).await?;

        tracing::info!(user_id = %user.user_id, "Password reset");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user_id: &UserId,
        input: ChangePasswordInput,
        client: &ClientInfo,
    ) -> AuthResult<()> {
        let deps = &self.deps;

        let mut user = deps
            .bounded("find_user_by_id", deps.repo.find_by_id(user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let current = ClearTextPassword::for_verification(input.current_password);
        let current_ok = match &user.password_hash {
            Some(hash) => deps.hasher.verify(hash, &current),
            None => deps.hasher.verify_dummy(&current),
        };
        if !current_ok {
            return Err(AuthError::InvalidCredentials);
        }

        let password = ClearTextPassword::new(input.new_password)?;
        if !self.replace_password(&mut user, &password).await? {
            // The password verified above is no longer the current one
            return Err(AuthError::InvalidCredentials);
        }
        self.after_password_change(&user, client).await?;

        tracing::info!(user_id = %user.user_id, "Password changed");
        Ok(())
    }

    /// False if another password change was stored after `user` was read
    async fn replace_password(
        &self,
        user: &mut User,
        password: &ClearTextPassword,
    ) -> AuthResult<bool> {
        let expected = user.password_changed_at;
        let hash = self.deps.hasher.hash(password)?;
        user.set_password(hash, self.deps.now());
        self.deps
            .bounded(
                "update_password",
                self.deps.repo.update_password(user, expected),
            )
            .await
    }

    async fn after_password_change(&self, user: &User, client: &ClientInfo) -> AuthResult<()> {
        InvalidateAllSessionsUseCase::new(self.deps.clone())
            .execute(&user.user_id)
            .await?;
        self.deps.monitor().notify_password_changed(user, client).await;
        Ok(())
    }
}
