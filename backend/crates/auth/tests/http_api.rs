//! HTTP surface, driven through the router without a listener

mod common;

use std::sync::Arc;

use auth::application::AuthConfig;
use auth::presentation::{RateLimitState, rate_limit};
use auth::{AuthAppState, auth_router};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::middleware::from_fn_with_state;
use axum::response::Response;
use common::{FIREFOX, Harness, PASSWORD, TOKYO};
use platform::rate_limit::{FixedWindowLimiter, RateLimitConfig};
use serde_json::{Value, json};
use tower::ServiceExt;

const EMAIL: &str = "ada@example.com";
const ADMIN_TOKEN: &str = "admin-secret-for-tests";

fn app(h: &Harness) -> Router {
    Router::new().nest("/api/v1/auth", auth_router(AuthAppState::new(h.deps.clone())))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, FIREFOX)
        .header("x-forwarded-for", TOKYO)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn bearer_json_request(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register_and_login(app: &Router) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/auth/register",
            json!({ "email": EMAIL, "password": PASSWORD, "fullName": "Ada Lovelace" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/auth/login",
            json!({ "email": EMAIL, "password": PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_register_and_login() {
    let h = Harness::new();
    let app = app(&h);

    let body = register_and_login(&app).await;

    assert_eq!(body["user"]["email"], EMAIL);
    assert_eq!(body["user"]["fullName"], "Ada Lovelace");
    assert_eq!(body["user"]["emailVerified"], false);
    assert_eq!(body["tokenType"], "Bearer");
    assert!(body["accessToken"].as_str().unwrap().starts_with("v4.public."));
    assert!(body["refreshToken"].as_str().unwrap().starts_with("v4.public."));
}

#[tokio::test]
async fn test_duplicate_registration_is_conflict() {
    let h = Harness::new();
    let app = app(&h);
    h.register(EMAIL).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/auth/register",
            json!({ "email": EMAIL, "password": PASSWORD, "fullName": "Ada" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["status"], 409);
}

#[tokio::test]
async fn test_bad_credentials_are_generic() {
    let h = Harness::new();
    let app = app(&h);
    h.register(EMAIL).await;

    let mut details = Vec::new();
    for email in [EMAIL, "nobody@example.com"] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/auth/login",
                json!({ "email": email, "password": "Wrong-Password-1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        details.push(body_json(response).await["detail"].clone());
    }

    assert_eq!(details[0], "Invalid email or password");
    assert_eq!(details[0], details[1]);
}

#[tokio::test]
async fn test_me_requires_bearer() {
    let h = Harness::new();
    let app = app(&h);
    let tokens = register_and_login(&app).await;

    let response = app
        .clone()
        .oneshot(Request::get("/api/v1/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["detail"], "Invalid or expired token");

    // Refresh tokens are not accepted as bearer credentials
    let refresh = tokens["refreshToken"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(bearer_request("GET", "/api/v1/auth/me", refresh))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let access = tokens["accessToken"].as_str().unwrap();
    let response = app
        .oneshot(bearer_request("GET", "/api/v1/auth/me", access))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], EMAIL);
}

#[tokio::test]
async fn test_update_and_delete_me() {
    let h = Harness::new();
    let app = app(&h);
    let tokens = register_and_login(&app).await;
    let access = tokens["accessToken"].as_str().unwrap();
    let refresh = tokens["refreshToken"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(bearer_json_request(
            "PATCH",
            "/api/v1/auth/me",
            access,
            json!({ "fullName": "  Augusta Ada King  ", "avatarUrl": "https://cdn.example.com/ada.png" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["fullName"], "Augusta Ada King");
    assert_eq!(body["avatarUrl"], "https://cdn.example.com/ada.png");
    assert_eq!(body["email"], EMAIL);

    let response = app
        .clone()
        .oneshot(bearer_json_request(
            "PATCH",
            "/api/v1/auth/me",
            access,
            json!({ "fullName": " " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(bearer_request("DELETE", "/api/v1/auth/me", access))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The access token is still well-formed, but its account is gone
    let response = app
        .clone()
        .oneshot(bearer_request("GET", "/api/v1/auth/me", access))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/auth/refresh",
            json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_then_logout() {
    let h = Harness::new();
    let app = app(&h);
    let tokens = register_and_login(&app).await;
    let refresh = tokens["refreshToken"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/auth/refresh",
            json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;
    let rotated = rotated["refreshToken"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/auth/refresh",
            json!({ "refreshToken": refresh }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/auth/logout",
                json!({ "refreshToken": rotated }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}

#[tokio::test]
async fn test_logout_all_reports_count() {
    let h = Harness::new();
    let app = app(&h);
    let tokens = register_and_login(&app).await;
    h.login(EMAIL, PASSWORD, &common::client(TOKYO, FIREFOX))
        .await
        .unwrap();

    let access = tokens["accessToken"].as_str().unwrap();
    let response = app
        .oneshot(bearer_request("POST", "/api/v1/auth/logout-all", access))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["sessionsRevoked"], 2);
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let h = Harness::new();
    let app = app(&h);
    h.register(EMAIL).await;

    for email in [EMAIL, "nobody@example.com"] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/auth/forgot-password",
                json!({ "email": email }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
    assert!(h.notifier.last_reset_token().is_some());
}

#[tokio::test]
async fn test_locked_account_is_423() {
    let h = Harness::without_rate_limit();
    let app = app(&h);
    h.register(EMAIL).await;

    for _ in 0..5 {
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/auth/login",
                json!({ "email": EMAIL, "password": "Wrong-Password-1" }),
            ))
            .await
            .unwrap();
    }

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/auth/login",
            json!({ "email": EMAIL, "password": PASSWORD }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::LOCKED);
}

#[tokio::test]
async fn test_admin_routes_closed_without_token() {
    let h = Harness::new();
    let user = h.register(EMAIL).await;
    let app = app(&h);

    let response = app
        .oneshot(
            Request::post(format!("/api/v1/auth/admin/unlock/{}", user.user_id))
                .header("x-admin-token", "")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_unlock() {
    let h = Harness::with_config(AuthConfig {
        enable_rate_limiting: false,
        admin_token: Some(ADMIN_TOKEN.to_string()),
        ..AuthConfig::default()
    });
    let user = h.register(EMAIL).await;
    let c = common::client(TOKYO, FIREFOX);
    for _ in 0..5 {
        h.login(EMAIL, "Wrong-Password-1", &c).await.unwrap_err();
    }
    let app = app(&h);
    let uri = format!("/api/v1/auth/admin/unlock/{}", user.user_id);

    let response = app
        .clone()
        .oneshot(
            Request::post(&uri)
                .header("x-admin-token", "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(
            Request::post(&uri)
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["unlocked"], true);

    let response = app
        .oneshot(
            Request::post("/api/v1/auth/admin/unlock/not-a-uuid")
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(h.login(EMAIL, PASSWORD, &c).await.is_ok());
}

#[tokio::test]
async fn test_per_ip_rate_limit() {
    let h = Harness::new();
    let limiter = Arc::new(FixedWindowLimiter::new(h.clock.clone()));
    let limited = auth_router(AuthAppState::new(h.deps.clone())).layer(from_fn_with_state(
        RateLimitState {
            limiter,
            config: RateLimitConfig::new(2, 60),
            clock: h.clock.clone(),
            scope: "auth",
        },
        rate_limit::<FixedWindowLimiter>,
    ));
    let app = Router::new().nest("/api/v1/auth", limited);

    let forgot = || {
        json_request(
            "POST",
            "/api/v1/auth/forgot-password",
            json!({ "email": "nobody@example.com" }),
        )
    };

    let response = app.clone().oneshot(forgot()).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers()["x-ratelimit-limit"], "2");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "1");

    app.clone().oneshot(forgot()).await.unwrap();

    let response = app.clone().oneshot(forgot()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

    h.advance(chrono::Duration::seconds(61));
    let response = app.oneshot(forgot()).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}
