//! Server configuration
//!
//! Read once at startup from the environment (`.env` is loaded first by
//! `main`). Unset variables fall back to the production defaults of
//! `AuthConfig` and `RateLimitConfig`.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration as StdDuration;

use anyhow::{Context, bail};
use auth::AuthConfig;
use auth::infra::MailerConfig;
use platform::rate_limit::RateLimitConfig;

const DEFAULT_PORT: u16 = 31113;
const DEFAULT_ORIGINS: &str = "http://localhost:40922,http://127.0.0.1:40922";
const DEFAULT_APP_URL: &str = "http://localhost:40922";

/// Token signing keys, hex encoded
#[derive(Debug, Clone)]
pub struct TokenKeys {
    pub secret_hex: String,
    pub public_hex: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub frontend_origins: Vec<String>,
    /// `None` means a throwaway pair is generated (debug builds only)
    pub token_keys: Option<TokenKeys>,
    pub auth: AuthConfig,
    /// Per-IP throttle applied to every auth route
    pub general_rate_limit: RateLimitConfig,
    pub mailer: MailerConfig,
    /// Emails are only logged when unset
    pub resend_api_key: Option<String>,
    /// Period of the expired cache entry / lock sweep
    pub cleanup_interval: StdDuration,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let port = parse_or("PORT", DEFAULT_PORT)?;
        let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);

        let frontend_origins = optional("FRONTEND_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let token_keys = match (optional("TOKEN_SECRET_KEY"), optional("TOKEN_PUBLIC_KEY")) {
            (Some(secret_hex), Some(public_hex)) => Some(TokenKeys {
                secret_hex,
                public_hex,
            }),
            (None, None) if cfg!(debug_assertions) => None,
            (None, None) => bail!("TOKEN_SECRET_KEY and TOKEN_PUBLIC_KEY must be set in production"),
            _ => bail!("TOKEN_SECRET_KEY and TOKEN_PUBLIC_KEY must be set together"),
        };

        let defaults = AuthConfig::default();
        let auth = AuthConfig {
            access_token_ttl: minutes_or("ACCESS_TOKEN_TTL_MINUTES", defaults.access_token_ttl)?,
            refresh_token_ttl: minutes_or("REFRESH_TOKEN_TTL_MINUTES", defaults.refresh_token_ttl)?,
            verification_token_ttl: minutes_or(
                "VERIFICATION_TOKEN_TTL_MINUTES",
                defaults.verification_token_ttl,
            )?,
            password_reset_token_ttl: minutes_or(
                "PASSWORD_RESET_TOKEN_TTL_MINUTES",
                defaults.password_reset_token_ttl,
            )?,
            max_login_attempts: parse_or("MAX_LOGIN_ATTEMPTS", defaults.max_login_attempts)?,
            lockout_window: minutes_or("LOCKOUT_WINDOW_MINUTES", defaults.lockout_window)?,
            lockout_duration: minutes_or("LOCKOUT_DURATION_MINUTES", defaults.lockout_duration)?,
            login_rate_limit: rate_limit_or("LOGIN_RATE_LIMIT", RateLimitConfig::auth())?,
            enable_rate_limiting: parse_or("ENABLE_RATE_LIMITING", defaults.enable_rate_limiting)?,
            store_timeout: StdDuration::from_millis(parse_or(
                "STORE_TIMEOUT_MS",
                defaults.store_timeout.as_millis() as u64,
            )?),
            enable_login_notifications: parse_or(
                "ENABLE_LOGIN_NOTIFICATIONS",
                defaults.enable_login_notifications,
            )?,
            enable_suspicious_activity_detection: parse_or(
                "ENABLE_SUSPICIOUS_ACTIVITY_DETECTION",
                defaults.enable_suspicious_activity_detection,
            )?,
            password_pepper: optional("PASSWORD_PEPPER").map(String::into_bytes),
            admin_token: optional("ADMIN_TOKEN"),
        };

        let app_url = optional("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        let app_url = app_url.trim_end_matches('/');
        let mailer = MailerConfig {
            from_email: optional("EMAIL_FROM").unwrap_or_else(|| "noreply@localhost".to_string()),
            from_name: optional("EMAIL_FROM_NAME"),
            verification_url: format!("{app_url}/verify-email"),
            password_reset_url: format!("{app_url}/reset-password"),
        };

        Ok(Self {
            database_url,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            bind_addr,
            frontend_origins,
            token_keys,
            auth,
            general_rate_limit: rate_limit_or("GENERAL_RATE_LIMIT", RateLimitConfig::general())?,
            mailer,
            resend_api_key: optional("RESEND_API_KEY"),
            cleanup_interval: StdDuration::from_secs(parse_or("CLEANUP_INTERVAL_SECS", 300)?),
        })
    }
}

/// Non-empty variable, trimmed
fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{key}: invalid value {raw:?}: {e}")),
        None => Ok(default),
    }
}

fn minutes_or(key: &str, default: chrono::Duration) -> anyhow::Result<chrono::Duration> {
    let minutes = parse_or(key, default.num_minutes())?;
    if minutes <= 0 {
        bail!("{key} must be positive");
    }
    Ok(chrono::Duration::minutes(minutes))
}

/// `"<max_requests>/<window_secs>"`, e.g. `100/60`
fn rate_limit_or(key: &str, default: RateLimitConfig) -> anyhow::Result<RateLimitConfig> {
    let Some(raw) = optional(key) else {
        return Ok(default);
    };
    parse_rate_limit(&raw).with_context(|| format!("{key}: expected <requests>/<seconds>"))
}

fn parse_rate_limit(raw: &str) -> anyhow::Result<RateLimitConfig> {
    let (requests, secs) = raw.split_once('/').context("missing '/'")?;
    let requests: u32 = requests.trim().parse()?;
    let secs: u64 = secs.trim().parse()?;
    if requests == 0 || secs == 0 {
        bail!("limit and window must be positive");
    }
    Ok(RateLimitConfig::new(requests, secs))
}
