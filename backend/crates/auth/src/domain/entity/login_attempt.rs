//! Login Attempt Entity
//!
//! Append-only audit row, written for every login attempt before any lockout
//! decision is made.

use chrono::{DateTime, Utc};
use kernel::id::{LoginAttemptId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub id: LoginAttemptId,
    /// `None` when the email matched no account
    pub user_id: Option<UserId>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: String,
    pub successful: bool,
    pub attempted_at: DateTime<Utc>,
}

impl LoginAttempt {
    pub fn new(
        user_id: Option<UserId>,
        ip_address: Option<String>,
        user_agent: Option<String>,
        location: impl Into<String>,
        successful: bool,
        attempted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LoginAttemptId::new(),
            user_id,
            ip_address,
            user_agent,
            location: location.into(),
            successful,
            attempted_at,
        }
    }
}
