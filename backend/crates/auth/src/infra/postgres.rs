//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use kernel::id::{AccountLockId, LoginAttemptId, OAuthAccountId, SecurityEventId, UserId};
use platform::password::HashedPassword;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{
    account_lock::AccountLock,
    login_attempt::LoginAttempt,
    oauth_account::{OAuthAccount, OAuthProvider},
    security_event::SecurityEvent,
    user::User,
};
use crate::domain::repository::{OAuthAccountRepository, SecurityRepository, UserRepository};
use crate::domain::value_object::email::Email;
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed credential store
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Remove lock rows that have already expired
    pub async fn cleanup_expired_locks(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM account_locks WHERE unlock_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(locks_deleted = deleted, "Cleaned up expired account locks");

        Ok(deleted)
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgAuthRepository {
    async fn create(&self, user: &User) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                email,
                password_hash,
                full_name,
                avatar_url,
                email_verified,
                password_changed_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_ref().map(HashedPassword::as_phc_string))
        .bind(&user.full_name)
        .bind(&user.avatar_url)
        .bind(user.email_verified)
        .bind(user.password_changed_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AuthError::EmailTaken),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                user_id,
                email,
                password_hash,
                full_name,
                avatar_url,
                email_verified,
                password_changed_at,
                created_at,
                updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT
                user_id,
                email,
                password_hash,
                full_name,
                avatar_url,
                email_verified,
                password_changed_at,
                created_at,
                updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                password_hash = $3,
                full_name = $4,
                avatar_url = $5,
                email_verified = $6,
                password_changed_at = $7,
                updated_at = $8
            WHERE user_id = $1
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.password_hash.as_ref().map(HashedPassword::as_phc_string))
        .bind(&user.full_name)
        .bind(&user.avatar_url)
        .bind(user.email_verified)
        .bind(user.password_changed_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }

        Ok(())
    }

    async fn update_password(
        &self,
        user: &User,
        expected: Option<DateTime<Utc>>,
    ) -> AuthResult<bool> {
        // Compare-and-set on password_changed_at; a concurrent change makes
        // this match no row
        let result = sqlx::query(
            r#"
            UPDATE users SET
                password_hash = $2,
                password_changed_at = $3,
                updated_at = $4
            WHERE user_id = $1
              AND password_changed_at IS NOT DISTINCT FROM $5
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.password_hash.as_ref().map(HashedPassword::as_phc_string))
        .bind(user.password_changed_at)
        .bind(user.updated_at)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_user(&self, user_id: &UserId) -> AuthResult<bool> {
        // Attempts, locks, events and provider links go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// ============================================================================
// Security Repository Implementation
// ============================================================================

impl SecurityRepository for PgAuthRepository {
    async fn record_login_attempt(&self, attempt: &LoginAttempt) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO login_attempts (
                id,
                user_id,
                ip_address,
                user_agent,
                location,
                successful,
                attempted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(attempt.id.as_uuid())
        .bind(attempt.user_id.map(UserId::into_uuid))
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .bind(&attempt.location)
        .bind(attempt.successful)
        .bind(attempt.attempted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_login_attempts(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> AuthResult<Vec<LoginAttempt>> {
        let rows = sqlx::query_as::<_, LoginAttemptRow>(
            r#"
            SELECT id, user_id, ip_address, user_agent, location, successful, attempted_at
            FROM login_attempts
            WHERE user_id = $1
            ORDER BY attempted_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(LoginAttemptRow::into_attempt).collect())
    }

    async fn lock_account(&self, lock: &AccountLock) -> AuthResult<AccountLock> {
        // One statement, so concurrent lockers converge on a single row
        let row = sqlx::query_as::<_, AccountLockRow>(
            r#"
            INSERT INTO account_locks (id, user_id, locked_at, unlock_at, reason, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                locked_at = EXCLUDED.locked_at,
                unlock_at = EXCLUDED.unlock_at,
                reason = EXCLUDED.reason,
                created_by = EXCLUDED.created_by
            RETURNING id, user_id, locked_at, unlock_at, reason, created_by
            "#,
        )
        .bind(lock.id.as_uuid())
        .bind(lock.user_id.as_uuid())
        .bind(lock.locked_at)
        .bind(lock.unlock_at)
        .bind(&lock.reason)
        .bind(&lock.created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_lock())
    }

    async fn unlock_account(&self, user_id: &UserId) -> AuthResult<bool> {
        let deleted = sqlx::query("DELETE FROM account_locks WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn account_lock(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<AccountLock>> {
        let row = sqlx::query_as::<_, AccountLockRow>(
            r#"
            SELECT id, user_id, locked_at, unlock_at, reason, created_by
            FROM account_locks
            WHERE user_id = $1 AND unlock_at > $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AccountLockRow::into_lock))
    }

    async fn record_security_event(&self, event: &SecurityEvent) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO security_events (
                id,
                user_id,
                event_type,
                ip_address,
                user_agent,
                location,
                description,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.user_id.as_uuid())
        .bind(event.event_type.as_str())
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.location)
        .bind(&event.description)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn security_events(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> AuthResult<Vec<SecurityEvent>> {
        let rows = sqlx::query_as::<_, SecurityEventRow>(
            r#"
            SELECT id, user_id, event_type, ip_address, user_agent, location, description, created_at
            FROM security_events
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SecurityEventRow::into_event).collect()
    }
}

// ============================================================================
// OAuth Account Repository Implementation
// ============================================================================

impl OAuthAccountRepository for PgAuthRepository {
    async fn link(&self, account: &OAuthAccount) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO oauth_accounts (
                id,
                user_id,
                provider,
                provider_user_id,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.user_id.as_uuid())
        .bind(account.provider.as_str())
        .bind(&account.provider_user_id)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AuthError::OAuthAccountConflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_provider(
        &self,
        provider: OAuthProvider,
        provider_user_id: &str,
    ) -> AuthResult<Option<OAuthAccount>> {
        let row = sqlx::query_as::<_, OAuthAccountRow>(
            r#"
            SELECT id, user_id, provider, provider_user_id, created_at, updated_at
            FROM oauth_accounts
            WHERE provider = $1 AND provider_user_id = $2
            "#,
        )
        .bind(provider.as_str())
        .bind(provider_user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OAuthAccountRow::into_account).transpose()
    }

    async fn find_by_user(&self, user_id: &UserId) -> AuthResult<Vec<OAuthAccount>> {
        let rows = sqlx::query_as::<_, OAuthAccountRow>(
            r#"
            SELECT id, user_id, provider, provider_user_id, created_at, updated_at
            FROM oauth_accounts
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OAuthAccountRow::into_account).collect()
    }

    async fn unlink(&self, user_id: &UserId, provider: OAuthProvider) -> AuthResult<bool> {
        let deleted =
            sqlx::query("DELETE FROM oauth_accounts WHERE user_id = $1 AND provider = $2")
                .bind(user_id.as_uuid())
                .bind(provider.as_str())
                .execute(&self.pool)
                .await?
                .rows_affected();

        Ok(deleted > 0)
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    password_hash: Option<String>,
    full_name: String,
    avatar_url: Option<String>,
    email_verified: bool,
    password_changed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let password_hash = self
            .password_hash
            .map(HashedPassword::from_phc_string)
            .transpose()
            .map_err(|e| AuthError::Internal(format!("Invalid password_hash: {}", e)))?;

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            email: Email::from_db(self.email),
            password_hash,
            full_name: self.full_name,
            avatar_url: self.avatar_url,
            email_verified: self.email_verified,
            password_changed_at: self.password_changed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LoginAttemptRow {
    id: Uuid,
    user_id: Option<Uuid>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    location: String,
    successful: bool,
    attempted_at: DateTime<Utc>,
}

impl LoginAttemptRow {
    fn into_attempt(self) -> LoginAttempt {
        LoginAttempt {
            id: LoginAttemptId::from_uuid(self.id),
            user_id: self.user_id.map(UserId::from_uuid),
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            location: self.location,
            successful: self.successful,
            attempted_at: self.attempted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AccountLockRow {
    id: Uuid,
    user_id: Uuid,
    locked_at: DateTime<Utc>,
    unlock_at: DateTime<Utc>,
    reason: String,
    created_by: String,
}

impl AccountLockRow {
    fn into_lock(self) -> AccountLock {
        AccountLock {
            id: AccountLockId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            locked_at: self.locked_at,
            unlock_at: self.unlock_at,
            reason: self.reason,
            created_by: self.created_by,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SecurityEventRow {
    id: Uuid,
    user_id: Uuid,
    event_type: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    location: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl SecurityEventRow {
    fn into_event(self) -> AuthResult<SecurityEvent> {
        let event_type = self
            .event_type
            .parse()
            .map_err(|e| AuthError::Internal(format!("Invalid event_type: {}", e)))?;

        Ok(SecurityEvent {
            id: SecurityEventId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            event_type,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            location: self.location,
            description: self.description,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OAuthAccountRow {
    id: Uuid,
    user_id: Uuid,
    provider: String,
    provider_user_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OAuthAccountRow {
    fn into_account(self) -> AuthResult<OAuthAccount> {
        Ok(OAuthAccount {
            id: OAuthAccountId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            provider: self.provider.parse()?,
            provider_user_id: self.provider_user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
