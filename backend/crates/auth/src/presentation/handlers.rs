//! HTTP Handlers

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, Extension, FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::IntoResponse;
use kernel::id::UserId;
use platform::client::ClientInfo;

use crate::application::{
    AuthDeps, AuthenticatedUser, ChangePasswordInput, EmailVerificationUseCase,
    InvalidateAllSessionsUseCase, LoginInput, LoginUseCase, LogoutUseCase, OAuthProfile,
    OAuthUseCase, PasswordUseCase, ProfileUseCase, RefreshTokenUseCase, RegisterInput,
    RegisterUseCase, ResetPasswordInput, UpdateProfileInput,
};
use crate::domain::entity::oauth_account::OAuthProvider;
use crate::domain::repository::{CacheStore, CredentialStore, Notifier};
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    AuthResponse, ChangePasswordRequest, EmailRequest, LoginRequest, LogoutAllResponse,
    MessageResponse, OAuthAccountResponse, OAuthProfileRequest, RefreshTokenRequest,
    RegisterRequest, ResetPasswordRequest, SecurityEventResponse, SecurityEventsQuery,
    TokenResponse, UnlockResponse, UpdateProfileRequest, UserResponse, VerifyEmailRequest,
    VerifyEmailResponse,
};

const DEFAULT_EVENT_LIMIT: usize = 20;
const MAX_EVENT_LIMIT: usize = 100;

/// Shared state for auth handlers
pub struct AuthAppState<R, C, N> {
    pub deps: AuthDeps<R, C, N>,
}

impl<R, C, N> Clone for AuthAppState<R, C, N> {
    fn clone(&self) -> Self {
        Self {
            deps: self.deps.clone(),
        }
    }
}

impl<R, C, N> AuthAppState<R, C, N> {
    pub fn new(deps: AuthDeps<R, C, N>) -> Self {
        Self { deps }
    }
}

/// Caller address and User-Agent
///
/// The peer address is optional so routers served without connect info
/// (tests) still work; proxy headers take precedence either way.
pub struct Client(pub ClientInfo);

impl<S: Send + Sync> FromRequestParts<S> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let direct_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        Ok(Client(ClientInfo::from_headers(&parts.headers, direct_ip)))
    }
}

// ============================================================================
// Registration and sessions
// ============================================================================

/// POST /register
pub async fn register<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Client(client): Client,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let input = RegisterInput {
        email: req.email,
        password: req.password,
        full_name: req.full_name,
        avatar_url: req.avatar_url,
    };

    let user = RegisterUseCase::new(state.deps).execute(input, &client).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// POST /login
pub async fn login<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Client(client): Client,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<AuthResponse>>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let input = LoginInput {
        email: req.email,
        password: req.password,
    };

    let output = LoginUseCase::new(state.deps).execute(input, &client).await?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(&output.user),
        tokens: output.tokens.into(),
    }))
}

/// POST /refresh
pub async fn refresh<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Json(req): Json<RefreshTokenRequest>,
) -> AuthResult<Json<TokenResponse>>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let tokens = RefreshTokenUseCase::new(state.deps)
        .execute(&req.refresh_token)
        .await?;

    Ok(Json(tokens.into()))
}

/// POST /logout
pub async fn logout<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Json(req): Json<RefreshTokenRequest>,
) -> AuthResult<StatusCode>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    LogoutUseCase::new(state.deps)
        .execute(&req.refresh_token)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /logout-all (bearer)
pub async fn logout_all<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> AuthResult<Json<LogoutAllResponse>>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let sessions_revoked = InvalidateAllSessionsUseCase::new(state.deps)
        .execute(&caller.user_id)
        .await?;

    Ok(Json(LogoutAllResponse { sessions_revoked }))
}

/// GET /me (bearer)
pub async fn me<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> AuthResult<Json<UserResponse>>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let user = ProfileUseCase::new(state.deps)
        .get_profile(&caller.user_id)
        .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// PATCH /me (bearer)
pub async fn update_me<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> AuthResult<Json<UserResponse>>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let input = UpdateProfileInput {
        full_name: req.full_name,
        avatar_url: req.avatar_url,
    };
    let user = ProfileUseCase::new(state.deps)
        .update_profile(&caller.user_id, input)
        .await?;

    Ok(Json(UserResponse::from(&user)))
}

/// DELETE /me (bearer)
pub async fn delete_me<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Client(client): Client,
) -> AuthResult<StatusCode>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    ProfileUseCase::new(state.deps)
        .delete_account(&caller.user_id, &client)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Email verification
// ============================================================================

/// POST /verify-email
pub async fn verify_email<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Client(client): Client,
    Json(req): Json<VerifyEmailRequest>,
) -> AuthResult<Json<VerifyEmailResponse>>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let verified = EmailVerificationUseCase::new(state.deps)
        .verify_email(&req.token, &client)
        .await?;

    Ok(Json(VerifyEmailResponse { verified }))
}

/// POST /resend-verification
pub async fn resend_verification<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Json(req): Json<EmailRequest>,
) -> AuthResult<(StatusCode, Json<MessageResponse>)>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    EmailVerificationUseCase::new(state.deps)
        .resend_verification(&req.email)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "If the address belongs to an unverified account, a verification email is on its way",
        )),
    ))
}

// ============================================================================
// Passwords
// ============================================================================

/// POST /forgot-password
pub async fn forgot_password<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Client(client): Client,
    Json(req): Json<EmailRequest>,
) -> AuthResult<(StatusCode, Json<MessageResponse>)>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    PasswordUseCase::new(state.deps)
        .request_password_reset(&req.email, &client)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "If the address belongs to an account, a reset link is on its way",
        )),
    ))
}

/// POST /reset-password
pub async fn reset_password<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Client(client): Client,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthResult<StatusCode>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let input = ResetPasswordInput {
        token: req.token,
        new_password: req.new_password,
    };
    PasswordUseCase::new(state.deps)
        .reset_password(input, &client)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /change-password (bearer)
pub async fn change_password<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Client(client): Client,
    Json(req): Json<ChangePasswordRequest>,
) -> AuthResult<StatusCode>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let input = ChangePasswordInput {
        current_password: req.current_password,
        new_password: req.new_password,
    };
    PasswordUseCase::new(state.deps)
        .change_password(&caller.user_id, input, &client)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// OAuth
// ============================================================================

fn into_profile(req: OAuthProfileRequest) -> AuthResult<OAuthProfile> {
    Ok(OAuthProfile {
        provider: req.provider.parse()?,
        provider_user_id: req.provider_user_id,
        email: req.email,
        email_verified: req.email_verified,
        name: req.name,
        avatar_url: req.avatar_url,
    })
}

/// POST /oauth/login
pub async fn oauth_login<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Client(client): Client,
    Json(req): Json<OAuthProfileRequest>,
) -> AuthResult<Json<AuthResponse>>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let profile = into_profile(req)?;
    let output = OAuthUseCase::new(state.deps)
        .oauth_login(profile, &client)
        .await?;

    Ok(Json(AuthResponse {
        user: UserResponse::from(&output.user),
        tokens: output.tokens.into(),
    }))
}

/// POST /oauth/link (bearer)
pub async fn oauth_link<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Json(req): Json<OAuthProfileRequest>,
) -> AuthResult<(StatusCode, Json<OAuthAccountResponse>)>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let profile = into_profile(req)?;
    let link = OAuthUseCase::new(state.deps)
        .link_oauth_account(&caller.user_id, profile)
        .await?;

    Ok((StatusCode::CREATED, Json(OAuthAccountResponse::from(&link))))
}

/// DELETE /oauth/{provider} (bearer)
pub async fn oauth_unlink<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(provider): Path<String>,
) -> AuthResult<StatusCode>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let provider: OAuthProvider = provider.parse()?;
    OAuthUseCase::new(state.deps)
        .unlink_oauth_account(&caller.user_id, provider)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Security
// ============================================================================

/// GET /me/security-events (bearer)
pub async fn security_events<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Query(query): Query<SecurityEventsQuery>,
) -> AuthResult<Json<Vec<SecurityEventResponse>>>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);

    let events = state
        .deps
        .monitor()
        .security_events(&caller.user_id, limit)
        .await?;

    Ok(Json(events.into_iter().map(Into::into).collect()))
}

/// POST /admin/unlock/{user_id} (admin token)
pub async fn admin_unlock<R, C, N>(
    State(state): State<AuthAppState<R, C, N>>,
    Client(client): Client,
    Path(user_id): Path<String>,
) -> AuthResult<Json<UnlockResponse>>
where
    R: CredentialStore,
    C: CacheStore + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    let user_id: UserId = user_id
        .parse()
        .map_err(|_| AuthError::Validation("Invalid user id".to_string()))?;

    let unlocked = state
        .deps
        .monitor()
        .unlock_account(&user_id, "admin", &client)
        .await?;

    Ok(Json(UnlockResponse { unlocked }))
}
