//! Platform Crate - Technical Infrastructure
//!
//! Building blocks with no knowledge of users or accounts:
//! - Injectable clock
//! - Signed token codec (PASETO v4.public)
//! - Fixed-window rate limiting
//! - Password hashing (Argon2id, NIST SP 800-63B policy)
//! - Client identification from HTTP headers
//! - Hashing helpers

pub mod client;
pub mod clock;
pub mod crypto;
pub mod password;
pub mod rate_limit;
pub mod token;
