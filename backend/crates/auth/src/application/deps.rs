//! Use case dependencies
//!
//! One bundle of collaborators shared by every auth use case. Cloning is
//! cheap (all `Arc`s).

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::clock::Clock;
use platform::password::PasswordHasher;
use platform::token::TokenCodec;

use crate::application::config::AuthConfig;
use crate::application::security::SecurityMonitor;
use crate::domain::geo::GeoLocator;
use crate::domain::repository::{CacheStore, CredentialStore, Notifier};
use crate::error::{AuthError, AuthResult};

pub struct AuthDeps<R, C, N> {
    pub repo: Arc<R>,
    pub cache: Arc<C>,
    pub notifier: Arc<N>,
    pub geo: Arc<dyn GeoLocator>,
    pub tokens: Arc<TokenCodec>,
    pub hasher: Arc<PasswordHasher>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<AuthConfig>,
}

impl<R, C, N> Clone for AuthDeps<R, C, N> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            cache: Arc::clone(&self.cache),
            notifier: Arc::clone(&self.notifier),
            geo: Arc::clone(&self.geo),
            tokens: Arc::clone(&self.tokens),
            hasher: Arc::clone(&self.hasher),
            clock: Arc::clone(&self.clock),
            config: Arc::clone(&self.config),
        }
    }
}

impl<R, C, N> AuthDeps<R, C, N>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(
        repo: Arc<R>,
        cache: Arc<C>,
        notifier: Arc<N>,
        geo: Arc<dyn GeoLocator>,
        tokens: Arc<TokenCodec>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        let hasher = PasswordHasher::new(config.password_pepper.clone());
        Self {
            repo,
            cache,
            notifier,
            geo,
            tokens,
            hasher: Arc::new(hasher),
            clock,
            config: Arc::new(config),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn monitor(&self) -> SecurityMonitor<R, N> {
        SecurityMonitor::new(
            Arc::clone(&self.repo),
            Arc::clone(&self.notifier),
            Arc::clone(&self.geo),
            Arc::clone(&self.clock),
            Arc::clone(&self.config),
        )
    }

    /// Run a store call under `store_timeout`
    pub(crate) async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> AuthResult<T>
    where
        F: Future<Output = AuthResult<T>>,
    {
        bounded(&self.config, operation, fut).await
    }

    /// Like [`Self::bounded`], but any store failure becomes `StoreUnavailable`
    ///
    /// For steps the request cannot complete without: reading lock state,
    /// writing or consuming a session record.
    pub(crate) async fn critical<T, F>(&self, operation: &'static str, fut: F) -> AuthResult<T>
    where
        F: Future<Output = AuthResult<T>>,
    {
        critical(&self.config, operation, fut).await
    }

    /// Run a side effect whose failure must not fail the caller
    pub(crate) async fn best_effort<F>(&self, operation: &'static str, fut: F)
    where
        F: Future<Output = AuthResult<()>>,
    {
        best_effort(&self.config, operation, fut).await
    }
}

pub(crate) async fn bounded<T, F>(config: &AuthConfig, operation: &'static str, fut: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    match tokio::time::timeout(config.store_timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(
                operation,
                timeout_ms = config.store_timeout.as_millis() as u64,
                "Store call timed out"
            );
            Err(AuthError::StoreUnavailable(format!("{operation} timed out")))
        }
    }
}

pub(crate) async fn critical<T, F>(config: &AuthConfig, operation: &'static str, fut: F) -> AuthResult<T>
where
    F: Future<Output = AuthResult<T>>,
{
    bounded(config, operation, fut).await.map_err(|e| match e {
        AuthError::StoreUnavailable(_) => e,
        AuthError::Database(_) | AuthError::Internal(_) => {
            tracing::error!(operation, error = %e, "Critical store call failed");
            AuthError::StoreUnavailable(format!("{operation}: {e}"))
        }
        other => other,
    })
}

pub(crate) async fn best_effort<F>(config: &AuthConfig, operation: &'static str, fut: F)
where
    F: Future<Output = AuthResult<()>>,
{
    if let Err(e) = bounded(config, operation, fut).await {
        tracing::warn!(operation, error = %e, "Best-effort step failed, continuing");
    }
}
