//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::{AuthAppState, Client};
pub use middleware::{RateLimitState, rate_limit, require_admin, require_auth};
pub use router::auth_router;
