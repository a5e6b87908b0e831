//! Validate Session Use Case
//!
//! Access tokens are checked statelessly: signature, expiry, and type.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::token::{TokenCodec, TokenType};

use crate::error::AuthResult;

/// Caller identity, inserted into request extensions by the bearer middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

pub struct ValidateSessionUseCase<'a> {
    tokens: &'a TokenCodec,
}

impl<'a> ValidateSessionUseCase<'a> {
    pub fn new(tokens: &'a TokenCodec) -> Self {
        Self { tokens }
    }

    pub fn execute(&self, access_token: &str) -> AuthResult<AuthenticatedUser> {
        let claims = self.tokens.verify_as(access_token, TokenType::Access)?;
        Ok(AuthenticatedUser {
            user_id: UserId::from_uuid(claims.sub),
            expires_at: claims.exp,
        })
    }
}
