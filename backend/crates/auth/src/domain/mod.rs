//! Domain Layer
//!
//! Entities, value objects, collaborator traits, and the pure lockout policy.

pub mod entity;
pub mod geo;
pub mod lockout;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{
    account_lock::AccountLock, login_attempt::LoginAttempt, oauth_account::OAuthAccount,
    security_event::SecurityEvent, user::User,
};
pub use lockout::LockoutPolicy;
pub use repository::{
    CacheStore, CredentialStore, Notifier, OAuthAccountRepository, SecurityRepository,
    UserRepository,
};
