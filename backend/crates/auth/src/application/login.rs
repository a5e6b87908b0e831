//! Login Use Case
//!
//! user lookup → lock gate → rate limit → password check → audit and
//! lockout bookkeeping → token pair with a stored session.
//!
//! The lock gate runs ahead of the per-email throttle and does not count
//! against it, so a locked account reports `AccountLocked` even once the
//! throttle is exhausted.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::password::ClearTextPassword;
use platform::rate_limit::RateLimitStore;

use crate::application::deps::AuthDeps;
use crate::application::session::TokenPair;
use crate::domain::entity::user::User;
use crate::domain::repository::{CacheStore, CredentialStore, Notifier, UserRepository};
use crate::domain::value_object::{email::Email, session_key::login_rate_limit_key};
use crate::error::{AuthError, AuthResult};
use crate::infra::cache_rate_limiter::CacheRateLimiter;

pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug)]
pub struct LoginOutput {
    pub user: User,
    pub tokens: TokenPair,
}

pub struct LoginUseCase<R, C, N> {
    deps: AuthDeps<R, C, N>,
}

impl<R, C, N> LoginUseCase<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(deps: AuthDeps<R, C, N>) -> Self {
        Self { deps }
    }

    pub async fn execute(&self, input: LoginInput, client: &ClientInfo) -> AuthResult<LoginOutput> {
        let deps = &self.deps;
        let monitor = deps.monitor();
        let password = ClearTextPassword::for_verification(input.password);

        // A malformed address cannot belong to any account
        let user = match Email::new(&input.email) {
            Ok(email) => {
                deps.bounded("find_user_by_email", deps.repo.find_by_email(&email))
                    .await?
            }
            Err(_) => None,
        };

        // Fail closed: an unreadable lock state must not let a locked account in
        if let Some(user) = &user {
            if let Some(lock) = monitor.is_account_locked(&user.user_id).await? {
                return Err(monitor.reject_locked(user, client, lock).await);
            }
        }

        self.check_rate_limit(&input.email).await?;

        let Some(user) = user else {
            deps.hasher.verify_dummy(&password);
            deps.best_effort("record_login_attempt", async {
                monitor.record_login_attempt(None, client, false).await.map(|_| ())
            })
            .await;
            return Err(AuthError::InvalidCredentials);
        };

        let password_ok = match &user.password_hash {
            Some(hash) => deps.hasher.verify(hash, &password),
            None => deps.hasher.verify_dummy(&password),
        };

        if !password_ok {
            let outcome = monitor.record_login_attempt(Some(&user), client, false).await;
            match outcome {
                Ok(outcome) => {
                    if let Some(lock) = outcome.locked {
                        tracing::info!(
                            user_id = %user.user_id,
                            unlock_at = %lock.unlock_at,
                            "Login failure triggered lock"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(user_id = %user.user_id, error = %e, "Failed to record failed login");
                }
            }
            return Err(AuthError::InvalidCredentials);
        }

        if let Err(e) = monitor.record_login_attempt(Some(&user), client, true).await {
            tracing::error!(user_id = %user.user_id, error = %e, "Failed to record successful login");
        }

        let tokens = deps.start_session(user.user_id).await?;

        self.reset_rate_limit(&input.email).await;

        tracing::info!(
            user_id = %user.user_id,
            ip = ?client.ip,
            "User logged in"
        );

        Ok(LoginOutput { user, tokens })
    }

    fn limiter(&self) -> CacheRateLimiter<C> {
        CacheRateLimiter::new(Arc::clone(&self.deps.cache))
    }

    /// Per-email throttle; an unreachable counter store lets the attempt
    /// through, the lock gate still applies
    async fn check_rate_limit(&self, email: &str) -> AuthResult<()> {
        if !self.deps.config.enable_rate_limiting {
            return Ok(());
        }

        let key = login_rate_limit_key(email);
        let limiter = self.limiter();
        let result = self
            .deps
            .bounded("login_rate_limit", async {
                limiter
                    .check_and_increment(&key, &self.deps.config.login_rate_limit)
                    .await
                    .map_err(|e| AuthError::StoreUnavailable(e.to_string()))
            })
            .await;

        match result {
            Ok(result) if result.allowed => Ok(()),
            Ok(result) => {
                tracing::warn!(key = %key, reset_at = %result.reset_at, "Login rate limit exceeded");
                Err(AuthError::RateLimitExceeded {
                    retry_after: result.retry_after(self.deps.now()),
                })
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Login rate limit check failed, allowing");
                Ok(())
            }
        }
    }

    async fn reset_rate_limit(&self, email: &str) {
        if !self.deps.config.enable_rate_limiting {
            return;
        }
        let key = login_rate_limit_key(email);
        let limiter = self.limiter();
        self.deps
            .best_effort("reset_login_rate_limit", async {
                limiter
                    .reset(&key)
                    .await
                    .map_err(|e| AuthError::StoreUnavailable(e.to_string()))
            })
            .await;
    }
}
