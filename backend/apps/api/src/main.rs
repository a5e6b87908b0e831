//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors; request errors render as problem
//! JSON through `auth::error::AuthError`.

mod config;

use std::sync::Arc;

use anyhow::Context;
use auth::application::AuthDeps;
use auth::domain::repository::CacheStore;
use auth::infra::{LogNotifier, Mailer, ResendNotifier, StaticGeoLocator};
use auth::presentation::{RateLimitState, rate_limit};
use auth::{AuthAppState, PgAuthRepository, PgCacheStore, auth_router};
use axum::middleware::from_fn_with_state;
use axum::{
    Router, http,
    http::{Method, header},
};
use platform::clock::{Clock, SystemClock};
use platform::rate_limit::FixedWindowLimiter;
use platform::token::TokenCodec;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,platform=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Database connection
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let repo = Arc::new(PgAuthRepository::new(pool.clone()));
    let cache = Arc::new(PgCacheStore::new(pool.clone(), Arc::clone(&clock)));

    // Startup cleanup
    // Errors here should not prevent server startup
    sweep_expired(&repo, &cache, clock.as_ref()).await;

    let tokens = match &settings.token_keys {
        Some(keys) => TokenCodec::from_hex(&keys.secret_hex, &keys.public_hex, Arc::clone(&clock))
            .context("invalid token keys")?,
        None => {
            tracing::warn!("No token keys configured, generated a throwaway pair (tokens will not survive a restart)");
            TokenCodec::generate(Arc::clone(&clock))?
        }
    };

    let mailer = match &settings.resend_api_key {
        Some(api_key) => Mailer::Resend(ResendNotifier::new(api_key.clone(), settings.mailer.clone())?),
        None => {
            tracing::warn!("RESEND_API_KEY not set, emails will only be logged");
            Mailer::Log(LogNotifier::new(settings.mailer.clone()))
        }
    };

    let deps = AuthDeps::new(
        Arc::clone(&repo),
        Arc::clone(&cache),
        Arc::new(mailer),
        Arc::new(StaticGeoLocator::new()),
        Arc::new(tokens),
        Arc::clone(&clock),
        settings.auth.clone(),
    );

    // Per-IP throttle, swept once per window
    let limiter = Arc::new(FixedWindowLimiter::new(Arc::clone(&clock)));
    let _limiter_cleanup = limiter.spawn_cleanup(settings.general_rate_limit.window);
    let throttle = RateLimitState {
        limiter,
        config: settings.general_rate_limit.clone(),
        clock: Arc::clone(&clock),
        scope: "auth",
    };

    // Periodic sweep of expired cache entries and lock rows
    {
        let repo = Arc::clone(&repo);
        let cache = Arc::clone(&cache);
        let clock = Arc::clone(&clock);
        let period = settings.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // first tick completes immediately; startup already swept
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sweep_expired(&repo, &cache, clock.as_ref()).await;
            }
        });
    }

    // CORS configuration
    let allowed_origins: Vec<http::HeaderValue> = settings
        .frontend_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    // Build router
    let auth_routes = auth_router(AuthAppState::new(deps))
        .layer(from_fn_with_state(throttle, rate_limit::<FixedWindowLimiter>));

    let app = Router::new()
        .nest("/api/v1/auth", auth_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = settings.bind_addr;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Drop expired cache entries and lock rows; failures are logged only
async fn sweep_expired(repo: &PgAuthRepository, cache: &PgCacheStore, clock: &dyn Clock) {
    match cache.purge_expired().await {
        Ok(deleted) => {
            tracing::info!(entries_deleted = deleted, "Expired cache entries purged");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cache cleanup failed, continuing anyway");
        }
    }

    match repo.cleanup_expired_locks(clock.now()).await {
        Ok(deleted) => {
            tracing::info!(locks_deleted = deleted, "Expired account locks removed");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Lock cleanup failed, continuing anyway");
        }
    }
}
