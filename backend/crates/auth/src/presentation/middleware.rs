//! Auth Middleware
//!
//! Bearer authentication, admin-token guard and per-client rate limiting.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::client::ClientInfo;
use platform::clock::Clock;
use platform::crypto::secrets_match;
use platform::rate_limit::{RateLimitConfig, RateLimitResult, RateLimitStore};

use crate::application::ValidateSessionUseCase;
use crate::error::AuthError;
use crate::presentation::handlers::AuthAppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Require a valid access token
///
/// On success the caller's `AuthenticatedUser` is added to the request
/// extensions for handlers to extract.
pub async fn require_auth<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers()).ok_or(AuthError::TokenMalformed)?;

    let caller = ValidateSessionUseCase::new(&state.deps.tokens).execute(token)?;
    req.extensions_mut().insert(caller);

    Ok(next.run(req).await)
}

/// Require the configured admin token
///
/// Admin routes are closed entirely when no token is configured.
pub async fn require_admin<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(expected) = state.deps.config.admin_token.as_deref() else {
        return Err(AuthError::Forbidden);
    };

    let presented = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !secrets_match(presented, expected) {
        tracing::warn!(path = %req.uri().path(), "Admin request with bad token");
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(req).await)
}

/// Rate limiter state for [`rate_limit`]
pub struct RateLimitState<L> {
    pub limiter: Arc<L>,
    pub config: RateLimitConfig,
    pub clock: Arc<dyn Clock>,
    /// Namespace so several limited route groups can share one store
    pub scope: &'static str,
}

impl<L> Clone for RateLimitState<L> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            scope: self.scope,
        }
    }
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        headers.insert(name, value);
    }
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    set_header(headers, "x-ratelimit-limit", result.limit);
    set_header(headers, "x-ratelimit-remaining", result.remaining);
    set_header(headers, "x-ratelimit-reset", result.reset_at.timestamp());
}

/// Fixed-window limit per client IP
///
/// An unreachable counter store lets the request through.
pub async fn rate_limit<L>(
    State(state): State<RateLimitState<L>>,
    req: Request<Body>,
    next: Next,
) -> Response
where
    L: RateLimitStore + Send + Sync + 'static,
{
    let direct_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let client = ClientInfo::from_headers(req.headers(), direct_ip);
    let key = format!("ratelimit:{}:{}", state.scope, client.rate_limit_key());

    let result = match state.limiter.check_and_increment(&key, &state.config).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Rate limit check failed, allowing");
            return next.run(req).await;
        }
    };

    if !result.allowed {
        tracing::warn!(key = %key, "Rate limit exceeded");
        let retry_after = result.retry_after(state.clock.now());
        let mut response = AuthError::RateLimitExceeded { retry_after }.into_response();
        apply_rate_limit_headers(response.headers_mut(), &result);
        return response;
    }

    let mut response = next.run(req).await;
    apply_rate_limit_headers(response.headers_mut(), &result);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer  abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
