//! Application Layer
//!
//! Use cases and application services.

pub mod config;
pub mod deps;
pub mod email_verification;
pub mod invalidate_sessions;
pub mod login;
pub mod logout;
pub mod oauth;
pub mod password;
pub mod profile;
pub mod refresh_token;
pub mod register;
pub mod security;
pub mod session;
pub mod validate_session;

// Re-exports
pub use config::AuthConfig;
pub use deps::AuthDeps;
pub use email_verification::EmailVerificationUseCase;
pub use invalidate_sessions::InvalidateAllSessionsUseCase;
pub use login::{LoginInput, LoginOutput, LoginUseCase};
pub use logout::LogoutUseCase;
pub use oauth::{OAuthProfile, OAuthUseCase};
pub use password::{ChangePasswordInput, PasswordUseCase, ResetPasswordInput};
pub use profile::{ProfileUseCase, UpdateProfileInput};
pub use refresh_token::RefreshTokenUseCase;
pub use register::{RegisterInput, RegisterUseCase};
pub use security::{AttemptOutcome, SecurityMonitor};
pub use session::TokenPair;
pub use validate_session::{AuthenticatedUser, ValidateSessionUseCase};
