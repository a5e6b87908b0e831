//! User Entity

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::password::HashedPassword;

use crate::domain::value_object::email::Email;

/// User entity
///
/// `password_hash` is `None` for accounts created through an OAuth provider
/// that never set a password.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub email: Email,
    pub password_hash: Option<HashedPassword>,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    /// Tokens issued for this user before this instant are no longer honored
    /// for password resets
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: Email,
        full_name: impl Into<String>,
        password_hash: Option<HashedPassword>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: UserId::new(),
            email,
            password_hash,
            full_name: full_name.into(),
            avatar_url: None,
            email_verified: false,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns false if the address was already verified
    pub fn mark_email_verified(&mut self, now: DateTime<Utc>) -> bool {
        if self.email_verified {
            return false;
        }
        self.email_verified = true;
        self.updated_at = now;
        true
    }

    pub fn set_password(&mut self, hash: HashedPassword, now: DateTime<Utc>) {
        self.password_hash = Some(hash);
        self.password_changed_at = Some(now);
        self.updated_at = now;
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Whether a token issued at `issued_at` predates the last password change
    pub fn is_stale_for_password_reset(&self, issued_at: DateTime<Utc>) -> bool {
        self.password_changed_at
            .is_some_and(|changed_at| issued_at < changed_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(now: DateTime<Utc>) -> User {
        User::new(Email::new("ada@example.com").unwrap(), "Ada", None, now)
    }

    #[test]
    fn test_mark_email_verified_once() {
        let now = Utc::now();
        let mut user = user(now);
        assert!(user.mark_email_verified(now));
        assert!(!user.mark_email_verified(now + Duration::seconds(1)));
        assert_eq!(user.updated_at, now);
    }

    #[test]
    fn test_stale_reset_token() {
        let now = Utc::now();
        let mut user = user(now);
        assert!(!user.is_stale_for_password_reset(now));

        let hash = platform::password::PasswordHasher::default()
            .hash(&platform::password::ClearTextPassword::for_verification(
                "Correct-Horse-42".to_string(),
            ))
            .unwrap();
        user.set_password(hash, now + Duration::minutes(1));

        assert!(user.is_stale_for_password_reset(now));
        assert!(!user.is_stale_for_password_reset(now + Duration::minutes(2)));
    }
}
