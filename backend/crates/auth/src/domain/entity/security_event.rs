//! Security Event Entity
//!
//! Append-only record of security-relevant account activity.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kernel::id::{SecurityEventId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    LoginSuccess,
    LoginFailed,
    NewDeviceLogin,
    NewLocationLogin,
    AccountCreated,
    AccountLocked,
    AccountUnlocked,
    AccountDisabled,
    AccountEnabled,
    PasswordChanged,
    PasswordReset,
    PasswordResetRequested,
    EmailChanged,
    EmailVerified,
    SuspiciousActivity,
    AdminAction,
}

impl SecurityEventType {
    pub const ALL: [SecurityEventType; 16] = [
        SecurityEventType::LoginSuccess,
        SecurityEventType::LoginFailed,
        SecurityEventType::NewDeviceLogin,
        SecurityEventType::NewLocationLogin,
        SecurityEventType::AccountCreated,
        SecurityEventType::AccountLocked,
        SecurityEventType::AccountUnlocked,
        SecurityEventType::AccountDisabled,
        SecurityEventType::AccountEnabled,
        SecurityEventType::PasswordChanged,
        SecurityEventType::PasswordReset,
        SecurityEventType::PasswordResetRequested,
        SecurityEventType::EmailChanged,
        SecurityEventType::EmailVerified,
        SecurityEventType::SuspiciousActivity,
        SecurityEventType::AdminAction,
    ];

    /// Database representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            SecurityEventType::LoginSuccess => "login_success",
            SecurityEventType::LoginFailed => "login_failed",
            SecurityEventType::NewDeviceLogin => "new_device_login",
            SecurityEventType::NewLocationLogin => "new_location_login",
            SecurityEventType::AccountCreated => "account_created",
            SecurityEventType::AccountLocked => "account_locked",
            SecurityEventType::AccountUnlocked => "account_unlocked",
            SecurityEventType::AccountDisabled => "account_disabled",
            SecurityEventType::AccountEnabled => "account_enabled",
            SecurityEventType::PasswordChanged => "password_changed",
            SecurityEventType::PasswordReset => "password_reset",
            SecurityEventType::PasswordResetRequested => "password_reset_requested",
            SecurityEventType::EmailChanged => "email_changed",
            SecurityEventType::EmailVerified => "email_verified",
            SecurityEventType::SuspiciousActivity => "suspicious_activity",
            SecurityEventType::AdminAction => "admin_action",
        }
    }
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown security event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for SecurityEventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    pub id: SecurityEventId,
    pub user_id: UserId,
    pub event_type: SecurityEventType,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn new(
        user_id: UserId,
        event_type: SecurityEventType,
        ip_address: Option<String>,
        user_agent: Option<String>,
        location: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SecurityEventId::new(),
            user_id,
            event_type,
            ip_address,
            user_agent,
            location: location.into(),
            description: description.into(),
            created_at,
        }
    }
}
