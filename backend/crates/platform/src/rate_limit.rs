//! Rate Limiting Infrastructure
//!
//! Fixed-window counters: each key owns a `{count, reset_at}` window. The
//! first call in a window opens it with `count = 1`; later calls increment and
//! are allowed while `count <= max_requests`. Denied calls still count.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::clock::Clock;

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::general()
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// API-wide throttle per client IP: 100 requests per minute
    pub fn general() -> Self {
        Self::new(100, 60)
    }

    /// Authentication endpoints: 5 attempts per 15 minutes
    pub fn auth() -> Self {
        Self::new(5, 15 * 60)
    }

    pub fn window_delta(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::MAX)
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitResult {
    /// Evaluate a counter value against the limit
    pub fn from_count(count: u64, config: &RateLimitConfig, reset_at: DateTime<Utc>) -> Self {
        let limit = u64::from(config.max_requests);
        Self {
            allowed: count <= limit,
            limit: config.max_requests,
            remaining: limit.saturating_sub(count) as u32,
            reset_at,
        }
    }

    /// Time until the window reopens, zero if already past
    pub fn retry_after(&self, now: DateTime<Utc>) -> Duration {
        (self.reset_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit store unavailable: {0}")]
    Store(String),
}

/// Trait for rate limit storage backends
#[trait_variant::make(RateLimitStore: Send)]
pub trait LocalRateLimitStore {
    /// Count this call against `key` and report whether it is allowed
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError>;

    /// Forget the window for `key`
    async fn reset(&self, key: &str) -> Result<(), RateLimitError>;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    reset_at: DateTime<Utc>,
}

/// In-process fixed-window limiter
///
/// A single mutex guards the counter map. For multi-process deployments use a
/// limiter backed by a shared store's atomic increment instead.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: Mutex<HashMap<String, Window>>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn check(&self, key: &str, config: &RateLimitConfig) -> RateLimitResult {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let window = windows
            .entry(key.to_owned())
            .and_modify(|w| {
                if now > w.reset_at {
                    *w = Window {
                        count: 1,
                        reset_at: now + config.window_delta(),
                    };
                } else {
                    w.count += 1;
                }
            })
            .or_insert_with(|| Window {
                count: 1,
                reset_at: now + config.window_delta(),
            });

        RateLimitResult::from_count(window.count, config, window.reset_at)
    }

    pub fn clear(&self, key: &str) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    /// Drop windows that have already elapsed; returns how many were removed
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let before = windows.len();
        windows.retain(|_, w| now <= w.reset_at);
        before - windows.len()
    }

    pub fn len(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep expired windows every `period` until the handle is aborted
    pub fn spawn_cleanup(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = limiter.cleanup();
                if removed > 0 {
                    tracing::debug!(removed, "Swept expired rate limit windows");
                }
            }
        })
    }
}

impl RateLimitStore for FixedWindowLimiter {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, RateLimitError> {
        Ok(self.check(key, config))
    }

    async fn reset(&self, key: &str) -> Result<(), RateLimitError> {
        self.clear(key);
        Ok(())
    }
}
