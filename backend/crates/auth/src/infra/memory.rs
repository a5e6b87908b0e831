//! In-memory store implementations
//!
//! Single-process stand-ins for Postgres and the shared cache. They read
//! time from the injected clock and can be switched into a failing state,
//! which the use-case tests rely on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::clock::Clock;

use crate::domain::entity::{
    account_lock::AccountLock,
    login_attempt::LoginAttempt,
    oauth_account::{OAuthAccount, OAuthProvider},
    security_event::SecurityEvent,
    user::User,
};
use crate::domain::repository::{
    CacheStore, Counter, OAuthAccountRepository, SecurityRepository, UserRepository,
};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn unavailable() -> AuthError {
    AuthError::Internal("store unavailable".to_string())
}

// ============================================================================
// Credential store
// ============================================================================

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    login_attempts: Vec<LoginAttempt>,
    account_locks: HashMap<UserId, AccountLock>,
    security_events: Vec<SecurityEvent>,
    oauth_accounts: Vec<OAuthAccount>,
}

#[derive(Debug)]
pub struct MemoryAuthRepository {
    tables: Mutex<Tables>,
    available: AtomicBool,
    lock_reads_available: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
}

impl MemoryAuthRepository {
    pub fn new() -> Self {
        Self {
            tables: Mutex::default(),
            available: AtomicBool::new(true),
            lock_reads_available: AtomicBool::new(true),
            read_delay: Mutex::default(),
        }
    }

    /// Hold every `find_by_id` result back by `delay`, so concurrent
    /// callers all read before any of them writes
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *lock(&self.read_delay) = delay;
    }

    /// Make every call fail until switched back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make only lock-state reads fail
    pub fn set_lock_reads_available(&self, available: bool) {
        self.lock_reads_available.store(available, Ordering::SeqCst);
    }

    /// All recorded attempts, oldest first
    pub fn login_attempts(&self) -> Vec<LoginAttempt> {
        lock(&self.tables).login_attempts.clone()
    }

    pub fn lock_count(&self) -> usize {
        lock(&self.tables).account_locks.len()
    }

    fn tables(&self) -> AuthResult<MutexGuard<'_, Tables>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(lock(&self.tables))
    }
}

impl Default for MemoryAuthRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl UserRepository for MemoryAuthRepository {
    async fn create(&self, user: &User) -> AuthResult<()> {
        let mut tables = self.tables()?;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AuthError::EmailTaken);
        }
        tables.users.insert(user.user_id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let user = self.tables()?.users.get(user_id).cloned();
        let delay = *lock(&self.read_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(user)
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        Ok(self.tables()?.users.values().any(|u| &u.email == email))
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        let mut tables = self.tables()?;
        match tables.users.get_mut(&user.user_id) {
            Some(stored) => {
                *stored = user.clone();
                Ok(())
            }
            None => Err(AuthError::UserNotFound),
        }
    }

    async fn update_password(
        &self,
        user: &User,
        expected: Option<DateTime<Utc>>,
    ) -> AuthResult<bool> {
        let mut tables = self.tables()?;
        let stored = tables
            .users
            .get_mut(&user.user_id)
            .ok_or(AuthError::UserNotFound)?;
        if stored.password_changed_at != expected {
            return Ok(false);
        }
        stored.password_hash = user.password_hash.clone();
        stored.password_changed_at = user.password_changed_at;
        stored.updated_at = user.updated_at;
        Ok(true)
    }

    async fn delete_user(&self, user_id: &UserId) -> AuthResult<bool> {
        let mut tables = self.tables()?;
        if tables.users.remove(user_id).is_none() {
            return Ok(false);
        }
        tables
            .login_attempts
            .retain(|a| a.user_id.as_ref() != Some(user_id));
        tables.account_locks.remove(user_id);
        tables.security_events.retain(|e| &e.user_id != user_id);
        tables.oauth_accounts.retain(|a| &a.user_id != user_id);
        Ok(true)
    }
}

impl SecurityRepository for MemoryAuthRepository {
    async fn record_login_attempt(&self, attempt: &LoginAttempt) -> AuthResult<()> {
        self.tables()?.login_attempts.push(attempt.clone());
        Ok(())
    }

    async fn recent_login_attempts(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> AuthResult<Vec<LoginAttempt>> {
        let tables = self.tables()?;
        let mut attempts: Vec<_> = tables
            .login_attempts
            .iter()
            .filter(|a| a.user_id.as_ref() == Some(user_id))
            .cloned()
            .collect();
        // Newest first, also among equal timestamps
        attempts.reverse();
        attempts.sort_by(|a, b| b.attempted_at.cmp(&a.attempted_at));
        attempts.truncate(limit);
        Ok(attempts)
    }

    async fn lock_account(&self, lock: &AccountLock) -> AuthResult<AccountLock> {
        let mut tables = self.tables()?;
        let stored = tables
            .account_locks
            .entry(lock.user_id)
            .and_modify(|existing| {
                existing.locked_at = lock.locked_at;
                existing.unlock_at = lock.unlock_at;
                existing.reason = lock.reason.clone();
                existing.created_by = lock.created_by.clone();
            })
            .or_insert_with(|| lock.clone());
        Ok(stored.clone())
    }

    async fn unlock_account(&self, user_id: &UserId) -> AuthResult<bool> {
        Ok(self.tables()?.account_locks.remove(user_id).is_some())
    }

    async fn account_lock(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AccountLock>> {
        if !self.lock_reads_available.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .tables()?
            .account_locks
            .get(user_id)
            .filter(|l| l.is_active(now))
            .cloned())
    }

    async fn record_security_event(&self, event: &SecurityEvent) -> AuthResult<()> {
        self.tables()?.security_events.push(event.clone());
        Ok(())
    }

    async fn security_events(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> AuthResult<Vec<SecurityEvent>> {
        let tables = self.tables()?;
        let mut events: Vec<_> = tables
            .security_events
            .iter()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect();
        events.reverse();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(limit);
        Ok(events)
    }
}

impl OAuthAccountRepository for MemoryAuthRepository {
    async fn link(&self, account: &OAuthAccount) -> AuthResult<()> {
        let mut tables = self.tables()?;
        let taken = tables.oauth_accounts.iter().any(|a| {
            (a.provider == account.provider && a.provider_user_id == account.provider_user_id)
                || (a.user_id == account.user_id && a.provider == account.provider)
        });
        if taken {
            return Err(AuthError::OAuthAccountConflict);
        }
        tables.oauth_accounts.push(account.clone());
        Ok(())
    }

    async fn find_by_provider(
        &self,
        provider: OAuthProvider,
        provider_user_id: &str,
    ) -> AuthResult<Option<OAuthAccount>> {
        Ok(self
            .tables()?
            .oauth_accounts
            .iter()
            .find(|a| a.provider == provider && a.provider_user_id == provider_user_id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: &UserId) -> AuthResult<Vec<OAuthAccount>> {
        Ok(self
            .tables()?
            .oauth_accounts
            .iter()
            .filter(|a| &a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn unlink(&self, user_id: &UserId, provider: OAuthProvider) -> AuthResult<bool> {
        let mut tables = self.tables()?;
        let before = tables.oauth_accounts.len();
        tables
            .oauth_accounts
            .retain(|a| !(&a.user_id == user_id && a.provider == provider));
        Ok(tables.oauth_accounts.len() < before)
    }
}

// ============================================================================
// Cache store
// ============================================================================

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl MemoryCacheStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::default(),
            clock,
            available: AtomicBool::new(true),
            delay: Mutex::default(),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Stall every call by `delay` (for timeout tests)
    pub fn set_delay(&self, delay: Option<Duration>) {
        *lock(&self.delay) = delay;
    }

    /// Live (unexpired) keys
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut keys: Vec<_> = lock(&self.entries)
            .iter()
            .filter(|(_, e)| e.expires_at > now)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    async fn entries(&self) -> AuthResult<MutexGuard<'_, HashMap<String, Entry>>> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut entries = lock(&self.entries);
        let now = self.clock.now();
        entries.retain(|_, e| e.expires_at > now);
        Ok(entries)
    }

    fn expiry(&self, ttl: Duration) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        self.clock
            .now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl CacheStore for MemoryCacheStore {
    async fn increment_counter(&self, key: &str, ttl: Duration) -> AuthResult<Counter> {
        let expires_at = self.expiry(ttl);
        let mut entries = self.entries().await?;
        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at,
        });
        let count = entry.value.parse::<u64>().unwrap_or(0) + 1;
        entry.value = count.to_string();
        Ok(Counter {
            count,
            expires_at: entry.expires_at,
        })
    }

    async fn reset_counter(&self, key: &str) -> AuthResult<()> {
        self.entries().await?.remove(key);
        Ok(())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()> {
        let expires_at = self.expiry(ttl);
        self.entries().await?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.entries().await?.get(key).map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> AuthResult<bool> {
        Ok(self.entries().await?.remove(key).is_some())
    }

    async fn take(&self, key: &str) -> AuthResult<Option<String>> {
        Ok(self.entries().await?.remove(key).map(|e| e.value))
    }

    async fn delete_by_pattern(&self, pattern: &str) -> AuthResult<u64> {
        let mut entries = self.entries().await?;
        let before = entries.len();
        entries.retain(|key, _| !glob_match(pattern, key));
        Ok((before - entries.len()) as u64)
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let now = self.clock.now();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        Ok((before - entries.len()) as u64)
    }
}

/// `*` matches any run of characters, everything else literally
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No `*` at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
