//! Application Configuration
//!
//! Configuration for the Auth application layer. Values are supplied by the
//! binary (environment); defaults below are the production defaults.

use std::time::Duration as StdDuration;

use chrono::Duration;
use platform::rate_limit::RateLimitConfig;

use crate::domain::lockout::LockoutPolicy;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub verification_token_ttl: Duration,
    pub password_reset_token_ttl: Duration,

    /// Failed attempts within `lockout_window` that lock an account
    pub max_login_attempts: u32,
    pub lockout_window: Duration,
    pub lockout_duration: Duration,

    /// Per-email login throttle
    pub login_rate_limit: RateLimitConfig,
    pub enable_rate_limiting: bool,

    /// Upper bound on any single store call made on behalf of a request
    pub store_timeout: StdDuration,

    pub enable_login_notifications: bool,
    pub enable_suspicious_activity_detection: bool,

    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,

    /// Shared secret for admin endpoints; admin routes are refused when unset
    pub admin_token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            verification_token_ttl: Duration::hours(24),
            password_reset_token_ttl: Duration::hours(1),
            max_login_attempts: 5,
            lockout_window: Duration::hours(1),
            lockout_duration: Duration::minutes(30),
            login_rate_limit: RateLimitConfig::auth(),
            enable_rate_limiting: true,
            store_timeout: StdDuration::from_secs(5),
            enable_login_notifications: true,
            enable_suspicious_activity_detection: true,
            password_pepper: None,
            admin_token: None,
        }
    }
}

impl AuthConfig {
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_failed_attempts: self.max_login_attempts,
            failure_window: self.lockout_window,
            lock_duration: self.lockout_duration,
            ..LockoutPolicy::default()
        }
    }

    /// Session records live exactly as long as the refresh token
    pub fn session_ttl(&self) -> StdDuration {
        self.refresh_token_ttl.to_std().unwrap_or(StdDuration::ZERO)
    }
}
