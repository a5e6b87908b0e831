//! Infrastructure Layer
//!
//! Database implementations and external service integrations.

pub mod cache_rate_limiter;
pub mod geo;
pub mod mailer;
pub mod memory;
pub mod pg_cache;
pub mod postgres;

pub use cache_rate_limiter::CacheRateLimiter;
pub use geo::StaticGeoLocator;
pub use mailer::{LogNotifier, Mailer, MailerConfig, ResendNotifier};
pub use memory::{MemoryAuthRepository, MemoryCacheStore};
pub use pg_cache::PgCacheStore;
pub use postgres::PgAuthRepository;
