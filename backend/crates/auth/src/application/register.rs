//! Register Use Case
//!
//! Creates the account, then sends the verification and welcome emails.
//! Email delivery is best-effort: registration succeeds without it.

use platform::client::ClientInfo;
use platform::password::ClearTextPassword;
use platform::token::TokenType;

use crate::application::deps::AuthDeps;
use crate::domain::entity::{security_event::SecurityEventType, user::User};
use crate::domain::repository::{CacheStore, CredentialStore, Notifier, UserRepository};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
}

pub struct RegisterUseCase<R, C, N> {
    deps: AuthDeps<R, C, N>,
}

impl<R, C, N> RegisterUseCase<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(deps: AuthDeps<R, C, N>) -> Self {
        Self { deps }
    }

    pub async fn execute(&self, input: RegisterInput, client: &ClientInfo) -> AuthResult<User> {
        let deps = &self.deps;

        let email = Email::new(&input.email)?;
        let full_name = input.full_name.trim();
        if full_name.is_empty() {
            return Err(AuthError::Validation("Full name is required".to_string()));
        }
        let password = ClearTextPassword::new(input.password)?;

        if deps
            .bounded("exists_by_email", deps.repo.exists_by_email(&email))
            .await?
        {
            return Err(AuthError::EmailTaken);
        }

        let hash = deps.hasher.hash(&password)?;
        let mut user = User::new(email, full_name, Some(hash), deps.now());
        user.avatar_url = input.avatar_url.filter(|url| !url.trim().is_empty());

        deps.bounded("create_user", deps.repo.create(&user)).await?;

        tracing::info!(user_id = %user.user_id, "User registered");

        let monitor = deps.monitor();
        monitor
            .log_event(
                user.user_id,
                SecurityEventType::AccountCreated,
                client,
                "Account created",
            )
            .await;

        match deps.tokens.issue(
            *user.user_id.as_uuid(),
            TokenType::Verification,
            deps.config.verification_token_ttl,
        ) {
            Ok(issued) => {
                deps.best_effort(
                    "send_verification_email",
                    deps.notifier.send_verification_email(&user, &issued.token),
                )
                .await;
            }
            Err(e) => {
                tracing::warn!(user_id = %user.user_id, error = %e, "Could not issue verification token");
            }
        }

        deps.best_effort("send_welcome_email", deps.notifier.send_welcome_email(&user))
            .await;

        Ok(user)
    }
}
