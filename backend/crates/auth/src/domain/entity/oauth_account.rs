//! OAuth Account Entity
//!
//! Link between a local user and an identity at an external provider.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kernel::id::{OAuthAccountId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            other => Err(AuthError::Validation(format!(
                "Unsupported OAuth provider: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthAccount {
    pub id: OAuthAccountId,
    pub user_id: UserId,
    pub provider: OAuthProvider,
    pub provider_user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthAccount {
    pub fn new(
        user_id: UserId,
        provider: OAuthProvider,
        provider_user_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OAuthAccountId::new(),
            user_id,
            provider,
            provider_user_id: provider_user_id.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
