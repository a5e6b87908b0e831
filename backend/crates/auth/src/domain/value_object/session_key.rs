//! Session Key Value Object
//!
//! Cache key of a refresh-token session: `session:{user_id}:{sha256(token)}`.
//! The token itself is never used as a key, and the user id prefix lets all
//! of a user's sessions be dropped with one pattern delete.

use std::fmt;

use kernel::id::UserId;
use platform::crypto::sha256_hex;

const PREFIX: &str = "session";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn for_token(user_id: &UserId, refresh_token: &str) -> Self {
        Self(format!(
            "{PREFIX}:{user_id}:{}",
            sha256_hex(refresh_token.as_bytes())
        ))
    }

    /// Glob matching every session of `user_id`
    pub fn user_pattern(user_id: &UserId) -> String {
        format!("{PREFIX}:{user_id}:*")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rate-limit counter key for login attempts against one email
pub fn login_rate_limit_key(email: &str) -> String {
    format!("login:{}", email.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_hides_token() {
        let user_id = UserId::new();
        let key = SessionKey::for_token(&user_id, "v4.public.secret-bytes");
        assert!(key.as_str().starts_with(&format!("session:{user_id}:")));
        assert!(!key.as_str().contains("secret-bytes"));
        assert_eq!(key.as_str().len(), "session:".len() + 36 + 1 + 64);
    }

    #[test]
    fn test_distinct_tokens_distinct_keys() {
        let user_id = UserId::new();
        assert_ne!(
            SessionKey::for_token(&user_id, "a"),
            SessionKey::for_token(&user_id, "b")
        );
    }

    #[test]
    fn test_user_pattern() {
        let user_id = UserId::new();
        assert_eq!(SessionKey::user_pattern(&user_id), format!("session:{user_id}:*"));
    }

    #[test]
    fn test_login_key_normalizes_email() {
        assert_eq!(login_rate_limit_key(" Ada@Example.com "), "login:ada@example.com");
    }
}
