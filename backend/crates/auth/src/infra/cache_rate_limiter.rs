//! Rate limiter backed by the shared cache store
//!
//! Counters live in the `CacheStore`, so every process behind the same
//! store sees the same windows. The first increment of a window fixes its
//! expiry; later increments never extend it.

use std::sync::Arc;

use platform::rate_limit::{RateLimitConfig, RateLimitError, RateLimitResult, RateLimitStore};

use crate::domain::repository::CacheStore;

pub struct CacheRateLimiter<C> {
    cache: Arc<C>,
}

impl<C> CacheRateLimiter<C> {
    pub fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }
}

impl<C> Clone for CacheRateLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<C> RateLimitStore for CacheRateLimiter<C>
where
    C: CacheStore + Send + Sync + 'static,
{
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        let counter = self
            .cache
            .increment_counter(key, config.window)
            .await
            .map_err(|e| RateLimitError::Store(e.to_string()))?;

        Ok(RateLimitResult::from_count(
            counter.count,
            config,
            counter.expires_at,
        ))
    }

    async fn reset(&self, key: &str) -> Result<(), RateLimitError> {
        self.cache
            .reset_counter(key)
            .await
            .map_err(|e| RateLimitError::Store(e.to_string()))
    }
}
