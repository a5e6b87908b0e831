//! Shared fixtures for the auth integration tests
//!
//! In-memory stores, a manual clock and a notifier that records instead of
//! sending.

#![allow(dead_code)]

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use auth::application::{
    AuthConfig, AuthDeps, LoginInput, LoginOutput, LoginUseCase, RegisterInput, RegisterUseCase,
};
use auth::domain::entity::security_event::SecurityEventType;
use auth::domain::entity::user::User;
use auth::domain::repository::{LoginNotice, Notifier, SecurityRepository};
use auth::error::{AuthError, AuthResult};
use auth::infra::{MemoryAuthRepository, MemoryCacheStore, StaticGeoLocator};
use chrono::{DateTime, TimeZone, Utc};
use platform::client::ClientInfo;
use platform::clock::ManualClock;
use platform::token::TokenCodec;

pub const PASSWORD: &str = "Correct-Horse-42";
pub const FIREFOX: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0";
pub const SAFARI_IOS: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

pub const TOKYO: &str = "203.0.113.10";
pub const BERLIN: &str = "198.51.100.20";
pub const AUSTIN: &str = "192.0.2.30";
pub const PARIS: &str = "203.0.113.40";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Verification { to: String, token: String },
    PasswordReset { to: String, token: String },
    Welcome { to: String },
    LoginNotification { to: String, notice: LoginNotice },
    PasswordChanged { to: String },
    AccountLocked { to: String, unlock_at: DateTime<Utc>, failed_attempts: u32 },
    SuspiciousActivity { to: String, location: String },
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_verification_token(&self) -> Option<String> {
        self.sent().into_iter().rev().find_map(|s| match s {
            Sent::Verification { token, .. } => Some(token),
            _ => None,
        })
    }

    pub fn last_reset_token(&self) -> Option<String> {
        self.sent().into_iter().rev().find_map(|s| match s {
            Sent::PasswordReset { token, .. } => Some(token),
            _ => None,
        })
    }

    pub fn count(&self, pred: impl Fn(&Sent) -> bool) -> usize {
        self.sent().iter().filter(|s| pred(s)).count()
    }

    fn record(&self, sent: Sent) -> AuthResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::Internal("mail provider down".to_string()));
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    async fn send_verification_email(&self, user: &User, token: &str) -> AuthResult<()> {
        self.record(Sent::Verification {
            to: user.email.as_str().to_string(),
            token: token.to_string(),
        })
    }

    async fn send_password_reset_email(&self, user: &User, token: &str) -> AuthResult<()> {
        self.record(Sent::PasswordReset {
            to: user.email.as_str().to_string(),
            token: token.to_string(),
        })
    }

    async fn send_welcome_email(&self, user: &User) -> AuthResult<()> {
        self.record(Sent::Welcome {
            to: user.email.as_str().to_string(),
        })
    }

    async fn send_login_notification(&self, user: &User, notice: &LoginNotice) -> AuthResult<()> {
        self.record(Sent::LoginNotification {
            to: user.email.as_str().to_string(),
            notice: notice.clone(),
        })
    }

    async fn send_password_changed_email(&self, user: &User) -> AuthResult<()> {
        self.record(Sent::PasswordChanged {
            to: user.email.as_str().to_string(),
        })
    }

    async fn send_account_locked_email(
        &self,
        user: &User,
        unlock_at: DateTime<Utc>,
        failed_attempts: u32,
    ) -> AuthResult<()> {
        self.record(Sent::AccountLocked {
            to: user.email.as_str().to_string(),
            unlock_at,
            failed_attempts,
        })
    }

    async fn send_suspicious_activity_email(
        &self,
        user: &User,
        location: &str,
        _ip_address: Option<&str>,
    ) -> AuthResult<()> {
        self.record(Sent::SuspiciousActivity {
            to: user.email.as_str().to_string(),
            location: location.to_string(),
        })
    }
}

pub type TestDeps = AuthDeps<MemoryAuthRepository, MemoryCacheStore, RecordingNotifier>;

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub repo: Arc<MemoryAuthRepository>,
    pub cache: Arc<MemoryCacheStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub deps: TestDeps,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AuthConfig::default())
    }

    /// Defaults without the per-email login throttle
    pub fn without_rate_limit() -> Self {
        Self::with_config(AuthConfig {
            enable_rate_limiting: false,
            ..AuthConfig::default()
        })
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ));
        let repo = Arc::new(MemoryAuthRepository::new());
        let cache = Arc::new(MemoryCacheStore::new(clock.clone()));
        let notifier = Arc::new(RecordingNotifier::default());
        let geo = StaticGeoLocator::new()
            .with_entry(TOKYO.parse().unwrap(), Some("Tokyo"), Some("Japan"))
            .with_entry(BERLIN.parse().unwrap(), Some("Berlin"), Some("Germany"))
            .with_entry(AUSTIN.parse().unwrap(), Some("Austin"), Some("United States"))
            .with_entry(PARIS.parse().unwrap(), Some("Paris"), Some("France"));
        let tokens = Arc::new(TokenCodec::generate(clock.clone()).unwrap());

        let deps = AuthDeps::new(
            Arc::clone(&repo),
            Arc::clone(&cache),
            Arc::clone(&notifier),
            Arc::new(geo),
            tokens,
            clock.clone(),
            config,
        );

        Self {
            clock,
            repo,
            cache,
            notifier,
            deps,
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }

    pub async fn register(&self, email: &str) -> User {
        RegisterUseCase::new(self.deps.clone())
            .execute(
                RegisterInput {
                    email: email.to_string(),
                    password: PASSWORD.to_string(),
                    full_name: "Ada Lovelace".to_string(),
                    avatar_url: None,
                },
                &client(TOKYO, FIREFOX),
            )
            .await
            .unwrap()
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> AuthResult<LoginOutput> {
        LoginUseCase::new(self.deps.clone())
            .execute(
                LoginInput {
                    email: email.to_string(),
                    password: password.to_string(),
                },
                client,
            )
            .await
    }

    pub async fn event_types(&self, user: &User) -> Vec<SecurityEventType> {
        self.repo
            .security_events(&user.user_id, 100)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }
}

pub fn client(ip: &str, user_agent: &str) -> ClientInfo {
    ClientInfo::new(Some(ip.parse::<IpAddr>().unwrap()), Some(user_agent.to_string()))
}
