//! Repository and Collaborator Traits
//!
//! Interfaces for persistence, the cache/session store, and outbound
//! notifications. Implementations live in the infrastructure layer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::UserId;

use crate::domain::entity::{
    account_lock::AccountLock,
    login_attempt::LoginAttempt,
    oauth_account::{OAuthAccount, OAuthProvider},
    security_event::SecurityEvent,
    user::User,
};
use crate::domain::value_object::email::Email;
use crate::error::AuthResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    async fn create(&self, user: &User) -> AuthResult<()>;

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>>;

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool>;

    async fn update(&self, user: &User) -> AuthResult<()>;

    /// Store `user`'s password fields only while the stored
    /// `password_changed_at` still equals `expected`
    ///
    /// Returns false when another password change got there first.
    async fn update_password(
        &self,
        user: &User,
        expected: Option<DateTime<Utc>>,
    ) -> AuthResult<bool>;

    /// Remove the user together with its login history, lock, security
    /// events and provider links; false if there was no such user
    async fn delete_user(&self, user_id: &UserId) -> AuthResult<bool>;
}

/// Login history, account locks and security events
#[trait_variant::make(SecurityRepository: Send)]
pub trait LocalSecurityRepository {
    async fn record_login_attempt(&self, attempt: &LoginAttempt) -> AuthResult<()>;

    /// Newest first
    async fn recent_login_attempts(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> AuthResult<Vec<LoginAttempt>>;

    /// Insert or replace the single lock row for `lock.user_id` in one atomic
    /// step; returns the stored row
    async fn lock_account(&self, lock: &AccountLock) -> AuthResult<AccountLock>;

    /// Returns false if there was no lock row
    async fn unlock_account(&self, user_id: &UserId) -> AuthResult<bool>;

    /// The lock row if it is still active at `now`
    async fn account_lock(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AccountLock>>;

    async fn record_security_event(&self, event: &SecurityEvent) -> AuthResult<()>;

    /// Newest first
    async fn security_events(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> AuthResult<Vec<SecurityEvent>>;
}

/// OAuth link repository trait
#[trait_variant::make(OAuthAccountRepository: Send)]
pub trait LocalOAuthAccountRepository {
    /// Fails with `OAuthAccountConflict` if the provider identity is already
    /// linked to a different user
    async fn link(&self, account: &OAuthAccount) -> AuthResult<()>;

    async fn find_by_provider(
        &self,
        provider: OAuthProvider,
        provider_user_id: &str,
    ) -> AuthResult<Option<OAuthAccount>>;

    async fn find_by_user(&self, user_id: &UserId) -> AuthResult<Vec<OAuthAccount>>;

    /// Returns false if no such link existed
    async fn unlink(&self, user_id: &UserId, provider: OAuthProvider) -> AuthResult<bool>;
}

/// Everything the credential store provides, in one bound
pub trait CredentialStore:
    UserRepository + SecurityRepository + OAuthAccountRepository + Send + Sync + 'static
{
}

impl<T> CredentialStore for T where
    T: UserRepository + SecurityRepository + OAuthAccountRepository + Send + Sync + 'static
{
}

/// Fixed-window counter state after an increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub count: u64,
    pub expires_at: DateTime<Utc>,
}

/// Key-value store with per-key expiry
///
/// Every method is atomic per key; nothing spans keys.
#[trait_variant::make(CacheStore: Send)]
pub trait LocalCacheStore {
    /// Increment `key`; the first increment of a window attaches `ttl`
    async fn increment_counter(&self, key: &str, ttl: Duration) -> AuthResult<Counter>;

    async fn reset_counter(&self, key: &str) -> AuthResult<()>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()>;

    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    /// Returns false if the key was absent; never an error for that case
    async fn delete(&self, key: &str) -> AuthResult<bool>;

    /// Get and delete in one step; at most one caller receives the value
    async fn take(&self, key: &str) -> AuthResult<Option<String>>;

    /// `*` matches any run of characters
    async fn delete_by_pattern(&self, pattern: &str) -> AuthResult<u64>;

    async fn purge_expired(&self) -> AuthResult<u64>;
}

/// Details included in a login notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginNotice {
    pub device: String,
    pub location: String,
    pub ip_address: Option<String>,
    pub at: DateTime<Utc>,
}

/// Outbound email
///
/// Callers treat every method as best-effort: failures are logged and never
/// fail the operation that triggered them.
#[trait_variant::make(Notifier: Send)]
pub trait LocalNotifier {
    async fn send_verification_email(&self, user: &User, token: &str) -> AuthResult<()>;

    async fn send_password_reset_email(&self, user: &User, token: &str) -> AuthResult<()>;

    async fn send_welcome_email(&self, user: &User) -> AuthResult<()>;

    async fn send_login_notification(&self, user: &User, notice: &LoginNotice) -> AuthResult<()>;

    async fn send_password_changed_email(&self, user: &User) -> AuthResult<()>;

    async fn send_account_locked_email(
        &self,
        user: &User,
        unlock_at: DateTime<Utc>,
        failed_attempts: u32,
    ) -> AuthResult<()>;

    async fn send_suspicious_activity_email(
        &self,
        user: &User,
        location: &str,
        ip_address: Option<&str>,
    ) -> AuthResult<()>;
}
