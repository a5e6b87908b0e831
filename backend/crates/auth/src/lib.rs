//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, repository traits, lockout policy
//! - `application/` - Use cases and application services
//! - `infra/` - Postgres, in-memory stores, mailer, geolocation
//! - `presentation/` - HTTP handlers, DTOs, router
//!
//! ## Features
//! - Email + password registration and login
//! - Access/refresh token pairs (PASETO v4.public), single-use refresh tokens
//!   backed by server-side session records
//! - Email verification and password reset by signed link
//! - OAuth sign-in with account linking
//!
//! ## Security Model
//! - Passwords hashed with Argon2id (NIST SP 800-63B compliant)
//! - Per-email login throttling and per-IP request limits
//! - Automatic lockout after repeated failed logins
//! - Audit trail of login attempts and security events, with new device,
//!   new location and suspicious activity notifications

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::deps::AuthDeps;
pub use error::{AuthError, AuthResult};
pub use infra::{pg_cache::PgCacheStore, postgres::PgAuthRepository};
pub use presentation::{handlers::AuthAppState, router::auth_router};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
    pub use crate::presentation::dto::*;
}

pub mod middleware {
    pub use crate::presentation::middleware::*;
}
