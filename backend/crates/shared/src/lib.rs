//! Shared Kernel
//!
//! Vocabulary shared by every backend crate:
//! - [`error::app_error::AppError`] and [`error::kind::ErrorKind`], the unified
//!   error surface that HTTP handlers render
//! - Typed UUID identifiers for the account and security records
//!
//! Nothing in here knows about tokens, sessions or lockout policy.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
