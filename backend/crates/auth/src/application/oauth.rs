//! OAuth Use Cases
//!
//! The provider exchange happens before these are called; they receive a
//! resolved profile and only deal with local accounts and links.

use kernel::id::UserId;
use platform::client::ClientInfo;

use crate::application::deps::AuthDeps;
use crate::application::login::LoginOutput;
use crate::domain::entity::{
    oauth_account::{OAuthAccount, OAuthProvider},
    security_event::SecurityEventType,
    user::User,
};
use crate::domain::repository::{
    CacheStore, CredentialStore, Notifier, OAuthAccountRepository, UserRepository,
};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// Identity as reported by the provider
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider: OAuthProvider,
    pub provider_user_id: String,
    pub email: String,
    /// Whether the provider vouches for the address
    pub email_verified: bool,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

pub struct OAuthUseCase<R, C, N> {
    deps: AuthDeps<R, C, N>,
}

impl<R, C, N> OAuthUseCase<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(deps: AuthDeps<R, C, N>) -> Self {
        Self { deps }
    }

    /// Sign in with a provider identity
    ///
    /// Resolution order: existing link, then an account with the same
    /// address, then a new account. An existing account is only linked
    /// automatically when the provider has verified the address.
    pub async fn oauth_login(
        &self,
        profile: OAuthProfile,
        client: &ClientInfo,
    ) -> AuthResult<LoginOutput> {
        let deps = &self.deps;
        let monitor = deps.monitor();

        if profile.provider_user_id.trim().is_empty() {
            return Err(AuthError::Validation("Missing provider user id".to_string()));
        }

        let user = self.resolve_user(&profile, client).await?;

        if let Some(lock) = monitor.is_account_locked(&user.user_id).await? {
            return Err(monitor.reject_locked(&user, client, lock).await);
        }

        if let Err(e) = monitor.record_login_attempt(Some(&user), client, true).await {
            tracing::error!(user_id = %user.user_id, error = %e, "Failed to record OAuth login");
        }

        let tokens = deps.start_session(user.user_id).await?;

        tracing::info!(
            user_id = %user.user_id,
            provider = %profile.provider,
            "User logged in with OAuth"
        );

        Ok(LoginOutput { user, tokens })
    }

    async fn resolve_user(&self, profile: &OAuthProfile, client: &ClientInfo) -> AuthResult<User> {
        let deps = &self.deps;

        let linked = deps
            .bounded(
                "find_oauth_account",
                deps.repo
                    .find_by_provider(profile.provider, &profile.provider_user_id),
            )
            .await?;
        if let Some(link) = linked {
            return deps
                .bounded("find_user_by_id", deps.repo.find_by_id(&link.user_id))
                .await?
                .ok_or(AuthError::UserNotFound);
        }

        let email = Email::new(&profile.email)?;
        let existing = deps
            .bounded("find_user_by_email", deps.repo.find_by_email(&email))
            .await?;

        let user = match existing {
            Some(mut user) => {
                if !profile.email_verified {
                    tracing::warn!(
                        user_id = %user.user_id,
                        provider = %profile.provider,
                        "Refusing to link unverified provider address to existing account"
                    );
                    return Err(AuthError::OAuthAccountConflict);
                }
                // The provider has proven control of the address
                if user.mark_email_verified(deps.now()) {
                    deps.bounded("update_user", deps.repo.update(&user)).await?;
                }
                user
            }
            None => self.create_user(email, profile, client).await?,
        };

        let link = OAuthAccount::new(
            user.user_id,
            profile.provider,
            profile.provider_user_id.clone(),
            deps.now(),
        );
        deps.bounded("link_oauth_account", deps.repo.link(&link))
            .await?;

        Ok(user)
    }

    async fn create_user(
        &self,
        email: Email,
        profile: &OAuthProfile,
        client: &ClientInfo,
    ) -> AuthResult<User> {
        let deps = &self.deps;

        let full_name = profile
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.as_str().split('@').next().unwrap_or_default())
            .to_string();

        let now = deps.now();
        let mut user = User::new(email, full_name, None, now);
        user.avatar_url = profile.avatar_url.clone();
        if profile.email_verified {
            user.mark_email_verified(now);
        }

        deps.bounded("create_user", deps.repo.create(&user)).await?;

        deps.monitor()
            .log_event(
                user.user_id,
                SecurityEventType::AccountCreated,
                client,
                format!("Account created via {}", profile.provider),
            )
            .await;
        deps.best_effort("send_welcome_email", deps.notifier.send_welcome_email(&user))
            .await;

        tracing::info!(user_id = %user.user_id, provider = %profile.provider, "User registered with OAuth");
        Ok(user)
    }

    /// Attach a provider identity to a signed-in account
    ///
    /// Linking an identity already linked to the same account is a no-op.
    pub async fn link_oauth_account(
        &self,
        user_id: &UserId,
        profile: OAuthProfile,
    ) -> AuthResult<OAuthAccount> {
        let deps = &self.deps;

        deps.bounded("find_user_by_id", deps.repo.find_by_id(user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let existing = deps
            .bounded(
                "find_oauth_account",
                deps.repo
                    .find_by_provider(profile.provider, &profile.provider_user_id),
            )
            .await?;
        match existing {
            Some(link) if link.user_id == *user_id => return Ok(link),
            Some(_) => return Err(AuthError::OAuthAccountConflict),
            None => {}
        }

        let links = deps
            .bounded("find_oauth_accounts", deps.repo.find_by_user(user_id))
            .await?;
        if links.iter().any(|link| link.provider == profile.provider) {
            return Err(AuthError::OAuthAccountConflict);
        }

        let link = OAuthAccount::new(
            *user_id,
            profile.provider,
            profile.provider_user_id,
            deps.now(),
        );
        deps.bounded("link_oauth_account", deps.repo.link(&link))
            .await?;

        tracing::info!(user_id = %user_id, provider = %link.provider, "OAuth account linked");
        Ok(link)
    }

    /// Remove a provider link
    ///
    /// Refused when it is the account's only way to sign in.
    pub async fn unlink_oauth_account(
        &self,
        user_id: &UserId,
        provider: OAuthProvider,
    ) -> AuthResult<()> {
        let deps = &self.deps;

        let user = deps
            .bounded("find_user_by_id", deps.repo.find_by_id(user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let links = deps
            .bounded("find_oauth_accounts", deps.repo.find_by_user(user_id))
            .await?;
        if !links.iter().any(|link| link.provider == provider) {
            return Err(AuthError::OAuthAccountNotFound);
        }
        if !user.has_password() && links.len() == 1 {
            return Err(AuthError::Validation(
                "Cannot remove the only sign-in method; set a password first".to_string(),
            ));
        }

        if !deps
            .bounded("unlink_oauth_account", deps.repo.unlink(user_id, provider))
            .await?
        {
            return Err(AuthError::OAuthAccountNotFound);
        }

        tracing::info!(user_id = %user_id, provider = %provider, "OAuth account unlinked");
        Ok(())
    }
}
