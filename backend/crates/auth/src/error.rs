//! Auth Error Types
//!
//! Auth-specific variants that render through `kernel::error::AppError`.
//! Credential and token failures share one generic client message each so a
//! caller cannot tell "unknown email" from "wrong password", or "expired" from
//! "revoked".

use std::time::Duration;

use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::password::{PasswordHashError, PasswordPolicyError};
use platform::token::TokenError;
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const INVALID_TOKEN: &str = "Invalid or expired token";

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// `retry_after` is the time left on the lock when it was read
    #[error("Account is locked until {until}")]
    AccountLocked {
        until: DateTime<Utc>,
        retry_after: Duration,
    },

    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: Duration },

    #[error("Token expired")]
    TokenExpired,

    #[error("Token malformed or signature invalid")]
    TokenMalformed,

    #[error("Wrong token type")]
    WrongTokenType,

    /// Refresh token has no live session record (revoked, rotated or expired)
    #[error("Session not found")]
    SessionNotFound,

    /// A backing store failed or timed out on a path that cannot proceed without it
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Email is already registered")]
    EmailTaken,

    #[error("User not found")]
    UserNotFound,

    #[error("OAuth account not linked")]
    OAuthAccountNotFound,

    #[error("OAuth account is linked to another user")]
    OAuthAccountConflict,

    #[error("Password validation failed: {0}")]
    PasswordValidation(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::TokenMalformed
            | AuthError::WrongTokenType
            | AuthError::SessionNotFound => ErrorKind::Unauthorized,
            AuthError::AccountLocked { .. } => ErrorKind::Locked,
            AuthError::RateLimitExceeded { .. } => ErrorKind::TooManyRequests,
            AuthError::StoreUnavailable(_) => ErrorKind::ServiceUnavailable,
            AuthError::EmailTaken | AuthError::OAuthAccountConflict => ErrorKind::Conflict,
            AuthError::UserNotFound | AuthError::OAuthAccountNotFound => ErrorKind::NotFound,
            AuthError::PasswordValidation(_) | AuthError::Validation(_) => ErrorKind::BadRequest,
            AuthError::Forbidden => ErrorKind::Forbidden,
            AuthError::Database(e) => match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                    ErrorKind::ServiceUnavailable
                }
                _ => ErrorKind::InternalServerError,
            },
            AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Message safe to show to the client
    pub fn public_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => INVALID_CREDENTIALS.to_string(),
            AuthError::TokenExpired
            | AuthError::TokenMalformed
            | AuthError::WrongTokenType
            | AuthError::SessionNotFound => INVALID_TOKEN.to_string(),
            AuthError::AccountLocked { .. } => "Account is temporarily locked".to_string(),
            AuthError::RateLimitExceeded { .. } => "Too many requests".to_string(),
            AuthError::StoreUnavailable(_) | AuthError::Database(_) => {
                "Service temporarily unavailable".to_string()
            }
            AuthError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether a store or transport failure caused this error
    pub fn is_store_failure(&self) -> bool {
        matches!(self, AuthError::StoreUnavailable(_) | AuthError::Database(_))
    }

    pub fn to_app_error(&self) -> AppError {
        let err = AppError::new(self.kind(), self.public_message());
        match self {
            AuthError::AccountLocked { retry_after, .. } => err
                .with_action("Try again after the lock expires")
                .with_retry_after(*retry_after),
            AuthError::RateLimitExceeded { retry_after } => err.with_retry_after(*retry_after),
            _ => err,
        }
    }

    /// Lock rejection as seen at `now`
    pub fn account_locked(until: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        AuthError::AccountLocked {
            until,
            retry_after: (until - now).to_std().unwrap_or(Duration::ZERO),
        }
    }

    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::StoreUnavailable(msg) => {
                tracing::error!(message = %msg, "Auth store unavailable");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredentials => {
                tracing::warn!("Invalid login attempt");
            }
            AuthError::AccountLocked { until, .. } => {
                tracing::warn!(%until, "Login attempt on locked account");
            }
            AuthError::RateLimitExceeded { .. } => {
                tracing::warn!("Rate limit exceeded");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        match err.kind() {
            ErrorKind::BadRequest | ErrorKind::UnprocessableEntity => {
                AuthError::Validation(err.message().to_string())
            }
            _ => AuthError::Internal(err.to_string()),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired(_) => AuthError::TokenExpired,
            TokenError::Malformed | TokenError::InvalidSignature => AuthError::TokenMalformed,
            TokenError::WrongTokenType { .. } => AuthError::WrongTokenType,
            TokenError::Key(msg) | TokenError::Signing(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<PasswordPolicyError> for AuthError {
    fn from(err: PasswordPolicyError) -> Self {
        AuthError::PasswordValidation(err.to_string())
    }
}

impl From<PasswordHashError> for AuthError {
    fn from(err: PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
