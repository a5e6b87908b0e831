//! Account Lock Entity
//!
//! At most one row per user. "Locked" is derived: a row exists and
//! `unlock_at` is still in the future.

use chrono::{DateTime, Utc};
use kernel::id::{AccountLockId, UserId};

/// `created_by` value for locks placed by the lockout engine
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLock {
    pub id: AccountLockId,
    pub user_id: UserId,
    pub locked_at: DateTime<Utc>,
    pub unlock_at: DateTime<Utc>,
    pub reason: String,
    pub created_by: String,
}

impl AccountLock {
    pub fn new(
        user_id: UserId,
        locked_at: DateTime<Utc>,
        unlock_at: DateTime<Utc>,
        reason: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: AccountLockId::new(),
            user_id,
            locked_at,
            unlock_at,
            reason: reason.into(),
            created_by: created_by.into(),
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.unlock_at > now
    }
}
