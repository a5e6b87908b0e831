//! PostgreSQL-backed cache store
//!
//! Sessions and rate-limit counters in the `cache_entries` table, shared by
//! every API process using the same database. Each operation is a single
//! statement, which gives the per-key atomicity `CacheStore` promises.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use platform::clock::Clock;
use sqlx::PgPool;

use crate::domain::repository::{CacheStore, Counter};
use crate::error::{AuthError, AuthResult};

#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgCacheStore {
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    fn expiry(&self, ttl: Duration) -> AuthResult<DateTime<Utc>> {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Internal(format!("TTL out of range: {ttl:?}")))
    }
}

/// Translate a `*` glob into a LIKE pattern with `\` as escape
fn like_pattern(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 4);
    for c in glob.chars() {
        match c {
            '*' => out.push('%'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

#[derive(sqlx::FromRow)]
struct CounterRow {
    count: i64,
    expires_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CacheStore for PgCacheStore {
    async fn increment_counter(&self, key: &str, ttl: Duration) -> AuthResult<Counter> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl)?;

        // An expired row restarts the window instead of counting on
        let row = sqlx::query_as::<_, CounterRow>(
            r#"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES ($1, '1', $2)
            ON CONFLICT (key) DO UPDATE SET
                value = CASE
                    WHEN cache_entries.expires_at <= $3 THEN '1'
                    ELSE (cache_entries.value::BIGINT + 1)::TEXT
                END,
                expires_at = CASE
                    WHEN cache_entries.expires_at <= $3 THEN EXCLUDED.expires_at
                    ELSE cache_entries.expires_at
                END
            RETURNING value::BIGINT AS count, expires_at
            "#,
        )
        .bind(key)
        .bind(expires_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(Counter {
            count: u64::try_from(row.count).unwrap_or(0),
            expires_at: row.expires_at,
        })
    }

    async fn reset_counter(&self, key: &str) -> AuthResult<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()> {
        let expires_at = self.expiry(ttl)?;

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM cache_entries WHERE key = $1 AND expires_at > $2",
        )
        .bind(key)
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn delete(&self, key: &str) -> AuthResult<bool> {
        let deleted = sqlx::query("DELETE FROM cache_entries WHERE key = $1 AND expires_at > $2")
            .bind(key)
            .bind(self.clock.now())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn take(&self, key: &str) -> AuthResult<Option<String>> {
        // DELETE ... RETURNING: of two concurrent takers only one gets the row
        let row = sqlx::query_as::<_, EntryRow>(
            "DELETE FROM cache_entries WHERE key = $1 RETURNING value, expires_at",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let now = self.clock.now();
        Ok(row.filter(|r| r.expires_at > now).map(|r| r.value))
    }

    async fn delete_by_pattern(&self, pattern: &str) -> AuthResult<u64> {
        let deleted = sqlx::query(
            r"DELETE FROM cache_entries WHERE key LIKE $1 ESCAPE '\' AND expires_at > $2",
        )
        .bind(like_pattern(pattern))
        .bind(self.clock.now())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted)
    }

    async fn purge_expired(&self) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= $1")
            .bind(self.clock.now())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted > 0 {
            tracing::debug!(entries_deleted = deleted, "Purged expired cache entries");
        }

        Ok(deleted)
    }
}
