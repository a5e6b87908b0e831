//! Auth Router

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::domain::repository::{CacheStore, CredentialStore, Notifier};
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{require_admin, require_auth};

/// Create the Auth router for any store implementation
///
/// Paths are relative; the binary nests this under `/api/v1/auth`.
pub fn auth_router<R, C, N>(state: AuthAppState<R, C, N>) -> Router
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let public = Router::new()
        .route("/register", post(handlers::register::<R, C, N>))
        .route("/login", post(handlers::login::<R, C, N>))
        .route("/refresh", post(handlers::refresh::<R, C, N>))
        .route("/logout", post(handlers::logout::<R, C, N>))
        .route("/verify-email", post(handlers::verify_email::<R, C, N>))
        .route(
            "/resend-verification",
            post(handlers::resend_verification::<R, C, N>),
        )
        .route("/forgot-password", post(handlers::forgot_password::<R, C, N>))
        .route("/reset-password", post(handlers::reset_password::<R, C, N>))
        .route("/oauth/login", post(handlers::oauth_login::<R, C, N>));

    let protected = Router::new()
        .route(
            "/me",
            get(handlers::me::<R, C, N>)
                .patch(handlers::update_me::<R, C, N>)
                .delete(handlers::delete_me::<R, C, N>),
        )
        .route(
            "/me/security-events",
            get(handlers::security_events::<R, C, N>),
        )
        .route("/change-password", post(handlers::change_password::<R, C, N>))
        .route("/logout-all", post(handlers::logout_all::<R, C, N>))
        .route("/oauth/link", post(handlers::oauth_link::<R, C, N>))
        .route("/oauth/{provider}", delete(handlers::oauth_unlink::<R, C, N>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<R, C, N>,
        ));

    let admin = Router::new()
        .route(
            "/admin/unlock/{user_id}",
            post(handlers::admin_unlock::<R, C, N>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin::<R, C, N>,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(admin)
        .with_state(state)
}
