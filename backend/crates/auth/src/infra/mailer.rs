//! Outbound email
//!
//! `ResendNotifier` posts to the Resend HTTP API; `LogNotifier` only logs
//! and is what development setups run with. `Mailer` picks one at startup.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entity::user::User;
use crate::domain::repository::{LoginNotice, Notifier};
use crate::error::{AuthError, AuthResult};

pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub from_email: String,
    pub from_name: Option<String>,
    /// Link target for verification mails; the token is appended as `?token=`
    pub verification_url: String,
    pub password_reset_url: String,
}

impl MailerConfig {
    fn from_header(&self) -> String {
        match &self.from_name {
            Some(name) if !name.is_empty() => format!("{name} <{}>", self.from_email),
            _ => self.from_email.clone(),
        }
    }
}

/// One rendered email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn link(base: &str, token: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}token={token}")
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

impl MailerConfig {
    pub fn verification_message(&self, user: &User, token: &str) -> EmailMessage {
        let url = link(&self.verification_url, token);
        EmailMessage {
            to: user.email.as_str().to_string(),
            subject: "Verify your email address".to_string(),
            html: format!(
                "<h2>Verify Your Email Address</h2>\
                 <p>Please click the link below to verify your email address:</p>\
                 <p><a href=\"{url}\">Verify Email</a></p>\
                 <p>If you didn't request this, you can safely ignore this email.</p>"
            ),
            text: format!("Please verify your email by opening the following link: {url}"),
        }
    }

    pub fn password_reset_message(&self, user: &User, token: &str) -> EmailMessage {
        let url = link(&self.password_reset_url, token);
        EmailMessage {
            to: user.email.as_str().to_string(),
            subject: "Reset your password".to_string(),
            html: format!(
                "<h2>Reset Your Password</h2>\
                 <p>You recently requested to reset your password. Click the link below to proceed:</p>\
                 <p><a href=\"{url}\">Reset Password</a></p>\
                 <p>If you didn't request this, you can safely ignore this email.</p>\
                 <p>This link will expire in 1 hour.</p>"
            ),
            text: format!("Reset your password by opening the following link: {url}"),
        }
    }

    pub fn welcome_message(&self, user: &User) -> EmailMessage {
        EmailMessage {
            to: user.email.as_str().to_string(),
            subject: "Welcome aboard".to_string(),
            html: format!(
                "<h2>Welcome, {}!</h2>\
                 <p>Thank you for joining. If you have any questions, reply to this email.</p>",
                escape_html(&user.full_name)
            ),
            text: format!("Welcome, {}! Thank you for joining.", user.full_name),
        }
    }

    pub fn login_notification_message(&self, user: &User, notice: &LoginNotice) -> EmailMessage {
        let ip = notice.ip_address.as_deref().unwrap_or("unknown");
        let at = format_time(notice.at);
        EmailMessage {
            to: user.email.as_str().to_string(),
            subject: "New login detected".to_string(),
            html: format!(
                "<h2>New Login Detected</h2>\
                 <p>We detected a new login to your account from:</p>\
                 <p>Device: {}</p><p>Location: {}</p><p>IP address: {}</p><p>Time: {at}</p>\
                 <p>If this wasn't you, please change your password immediately.</p>",
                escape_html(&notice.device),
                escape_html(&notice.location),
                escape_html(ip),
            ),
            text: format!(
                "New login from {} ({}), IP {ip} at {at}. If this wasn't you, change your password.",
                notice.device, notice.location
            ),
        }
    }

    pub fn password_changed_message(&self, user: &User) -> EmailMessage {
        EmailMessage {
            to: user.email.as_str().to_string(),
            subject: "Your password has been changed".to_string(),
            html: "<h2>Password Changed</h2>\
                   <p>Your password has been changed and all sessions were signed out.</p>\
                   <p>If you didn't make this change, reset your password immediately.</p>"
                .to_string(),
            text: "Your password has been changed and all sessions were signed out.".to_string(),
        }
    }

    pub fn account_locked_message(
        &self,
        user: &User,
        unlock_at: DateTime<Utc>,
        failed_attempts: u32,
    ) -> EmailMessage {
        let until = format_time(unlock_at);
        EmailMessage {
            to: user.email.as_str().to_string(),
            subject: "Your account has been locked".to_string(),
            html: format!(
                "<h2>Account Temporarily Locked</h2>\
                 <p>After {failed_attempts} failed login attempts your account is locked until {until}.</p>\
                 <p>If these attempts weren't yours, consider resetting your password.</p>"
            ),
            text: format!(
                "After {failed_attempts} failed login attempts your account is locked until {until}."
            ),
        }
    }

    pub fn suspicious_activity_message(
        &self,
        user: &User,
        location: &str,
        ip_address: Option<&str>,
    ) -> EmailMessage {
        let ip = ip_address.unwrap_or("unknown");
        EmailMessage {
            to: user.email.as_str().to_string(),
            subject: "Unusual sign-in activity".to_string(),
            html: format!(
                "<h2>Unusual Activity</h2>\
                 <p>Your account was just used from {} (IP {}) after recent activity in several other places.</p>\
                 <p>If this wasn't you, change your password immediately.</p>",
                escape_html(location),
                escape_html(ip),
            ),
            text: format!(
                "Your account was just used from {location} (IP {ip}) after recent activity in several other places."
            ),
        }
    }
}

// ============================================================================
// Log notifier
// ============================================================================

#[derive(Debug, Clone)]
pub struct LogNotifier {
    config: MailerConfig,
}

impl LogNotifier {
    pub fn new(config: MailerConfig) -> Self {
        Self { config }
    }

    fn deliver(&self, message: EmailMessage) -> AuthResult<()> {
        tracing::info!(to = %message.to, subject = %message.subject, "Email (not sent)");
        tracing::debug!(body = %message.text, "Email body");
        Ok(())
    }
}

impl Notifier for LogNotifier {
    async fn send_verification_email(&self, user: &User, token: &str) -> AuthResult<()> {
        self.deliver(self.config.verification_message(user, token))
    }

    async fn send_password_reset_email(&self, user: &User, token: &str) -> AuthResult<()> {
        self.deliver(self.config.password_reset_message(user, token))
    }

    async fn send_welcome_email(&self, user: &User) -> AuthResult<()> {
        self.deliver(self.config.welcome_message(user))
    }

    async fn send_login_notification(&self, user: &User, notice: &LoginNotice) -> AuthResult<()> {
        self.deliver(self.config.login_notification_message(user, notice))
    }

    async fn send_password_changed_email(&self, user: &User) -> AuthResult<()> {
        self.deliver(self.config.password_changed_message(user))
    }

    async fn send_account_locked_email(
        &self,
        user: &User,
        unlock_at: DateTime<Utc>,
        failed_attempts: u32,
    ) -> AuthResult<()> {
        self.deliver(
            self.config
                .account_locked_message(user, unlock_at, failed_attempts),
        )
    }

    async fn send_suspicious_activity_email(
        &self,
        user: &User,
        location: &str,
        ip_address: Option<&str>,
    ) -> AuthResult<()> {
        self.deliver(
            self.config
                .suspicious_activity_message(user, location, ip_address),
        )
    }
}

// ============================================================================
// Resend notifier
// ============================================================================

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct ResendNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
    config: MailerConfig,
}

impl ResendNotifier {
    pub fn new(api_key: impl Into<String>, config: MailerConfig) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: RESEND_API_URL.to_string(),
            api_key: api_key.into(),
            from: config.from_header(),
            config,
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    async fn deliver(&self, message: EmailMessage) -> AuthResult<()> {
        let body = ResendRequest {
            from: &self.from,
            to: [&message.to],
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Internal(format!("Email request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(%status, detail = %detail, subject = %message.subject, "Email provider rejected message");
            return Err(AuthError::Internal(format!("Email provider returned {status}")));
        }

        tracing::debug!(subject = %message.subject, "Email sent");
        Ok(())
    }
}

impl Notifier for ResendNotifier {
    async fn send_verification_email(&self, user: &User, token: &str) -> AuthResult<()> {
        self.deliver(self.config.verification_message(user, token))
            .await
    }

    async fn send_password_reset_email(&self, user: &User, token: &str) -> AuthResult<()> {
        self.deliver(self.config.password_reset_message(user, token))
            .await
    }

    async fn send_welcome_email(&self, user: &User) -> AuthResult<()> {
        self.deliver(self.config.welcome_message(user)).await
    }

    async fn send_login_notification(&self, user: &User, notice: &LoginNotice) -> AuthResult<()> {
        self.deliver(self.config.login_notification_message(user, notice))
            .await
    }

    async fn send_password_changed_email(&self, user: &User) -> AuthResult<()> {
        self.deliver(self.config.password_changed_message(user))
            .await
    }

    async fn send_account_locked_email(
        &self,
        user: &User,
        unlock_at: DateTime<Utc>,
        failed_attempts: u32,
    ) -> AuthResult<()> {
        self.deliver(
            self.config
                .account_locked_message(user, unlock_at, failed_attempts),
        )
        .await
    }

    async fn send_suspicious_activity_email(
        &self,
        user: &User,
        location: &str,
        ip_address: Option<&str>,
    ) -> AuthResult<()> {
        self.deliver(
            self.config
                .suspicious_activity_message(user, location, ip_address),
        )
        .await
    }
}

// ============================================================================
// Runtime selection
// ============================================================================

/// Notifier chosen from configuration at startup
#[derive(Debug, Clone)]
pub enum Mailer {
    Log(LogNotifier),
    Resend(ResendNotifier),
}

impl Notifier for Mailer {
    async fn send_verification_email(&self, user: &User, token: &str) -> AuthResult<()> {
        match self {
            Mailer::Log(n) => n.send_verification_email(user, token).await,
            Mailer::Resend(n) => n.send_verification_email(user, token).await,
        }
    }

    async fn send_password_reset_email(&self, user: &User, token: &str) -> AuthResult<()> {
        match self {
            Mailer::Log(n) => n.send_password_reset_email(user, token).await,
            Mailer::Resend(n) => n.send_password_reset_email(user, token).await,
        }
    }

    async fn send_welcome_email(&self, user: &User) -> AuthResult<()> {
        match self {
            Mailer::Log(n) => n.send_welcome_email(user).await,
            Mailer::Resend(n) => n.send_welcome_email(user).await,
        }
    }

    async fn send_login_notification(&self, user: &User, notice: &LoginNotice) -> AuthResult<()> {
        match self {
            Mailer::Log(n) => n.send_login_notification(user, notice).await,
            Mailer::Resend(n) => n.send_login_notification(user, notice).await,
        }
    }

    async fn send_password_changed_email(&self, user: &User) -> AuthResult<()> {
        match self {
            Mailer::Log(n) => n.send_password_changed_email(user).await,
            Mailer::Resend(n) => n.send_password_changed_email(user).await,
        }
    }

    async fn send_account_locked_email(
        &self,
        user: &User,
        unlock_at: DateTime<Utc>,
        failed_attempts: u32,
    ) -> AuthResult<()> {
        match self {
            Mailer::Log(n) => {
                n.send_account_locked_email(user, unlock_at, failed_attempts)
                    .await
            }
            Mailer::Resend(n) => {
                n.send_account_locked_email(user, unlock_at, failed_attempts)
                    .await
            }
        }
    }

    async fn send_suspicious_activity_email(
        &self,
        user: &User,
        location: &str,
        ip_address: Option<&str>,
    ) -> AuthResult<()> {
        match self {
            Mailer::Log(n) => {
                n.send_suspicious_activity_email(user, location, ip_address)
                    .await
            }
            Mailer::Resend(n) => {
                n.send_suspicious_activity_email(user, location, ip_address)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::email::Email;
    use chrono::TimeZone;

    fn config() -> MailerConfig {
        MailerConfig {
            from_email: "no-reply@example.com".to_string(),
            from_name: Some("Example".to_string()),
            verification_url: "https://app.example.com/verify".to_string(),
            password_reset_url: "https://app.example.com/reset?src=mail".to_string(),
        }
    }

    fn user() -> User {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        User::new(
            Email::new("ada@example.com").unwrap(),
            "Ada <script>",
            None,
            now,
        )
    }

    #[test]
    fn test_from_header() {
        assert_eq!(config().from_header(), "Example <no-reply@example.com>");
        let bare = MailerConfig {
            from_name: None,
            ..config()
        };
        assert_eq!(bare.from_header(), "no-reply@example.com");
    }

    #[test]
    fn test_links_carry_token() {
        let verify = config().verification_message(&user(), "tok");
        assert!(verify.text.contains("https://app.example.com/verify?token=tok"));

        let reset = config().password_reset_message(&user(), "tok");
        assert!(reset.html.contains("https://app.example.com/reset?src=mail&token=tok"));
        assert_eq!(reset.to, "ada@example.com");
    }

    #[test]
    fn test_user_supplied_text_is_escaped() {
        let welcome = config().welcome_message(&user());
        assert!(welcome.html.contains("Ada &lt;script&gt;"));
        assert!(!welcome.html.contains("<script>"));
    }

    #[test]
    fn test_account_locked_message_mentions_attempts() {
        let unlock_at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let message = config().account_locked_message(&user(), unlock_at, 5);
        assert!(message.text.contains("5 failed login attempts"));
        assert!(message.text.contains("2025-03-01 12:30 UTC"));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notifier = Mailer::Log(LogNotifier::new(config()));
        assert!(notifier.send_welcome_email(&user()).await.is_ok());
    }
}
