//! Security Monitor Use Case
//!
//! Account lockout engine and security-event bookkeeping. Every login
//! attempt is written to the audit trail first; lockout and anomaly
//! detection run over the stored history afterwards.

use std::sync::Arc;

use kernel::id::UserId;
use platform::client::ClientInfo;
use platform::clock::Clock;

use crate::application::config::AuthConfig;
use crate::application::deps::{best_effort, bounded, critical};
use crate::domain::entity::{
    account_lock::{AccountLock, SYSTEM_ACTOR},
    login_attempt::LoginAttempt,
    security_event::{SecurityEvent, SecurityEventType},
    user::User,
};
use crate::domain::geo::{GeoLocator, describe_device, resolve_location};
use crate::domain::lockout::{DEVICE_HISTORY, EVENT_HISTORY, FAILURE_HISTORY, LockoutPolicy};
use crate::domain::repository::{LoginNotice, Notifier, SecurityRepository};
use crate::error::{AuthError, AuthResult};

/// Outcome of recording one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub attempt: LoginAttempt,
    /// Lock placed as a consequence of this attempt
    pub locked: Option<AccountLock>,
    /// New-device / new-location classification of a successful attempt
    pub new_login: Option<SecurityEventType>,
    pub suspicious: bool,
}

pub struct SecurityMonitor<R, N> {
    repo: Arc<R>,
    notifier: Arc<N>,
    geo: Arc<dyn GeoLocator>,
    clock: Arc<dyn Clock>,
    config: Arc<AuthConfig>,
    policy: LockoutPolicy,
}

impl<R, N> SecurityMonitor<R, N>
where
    R: SecurityRepository + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
{
    pub fn new(
        repo: Arc<R>,
        notifier: Arc<N>,
        geo: Arc<dyn GeoLocator>,
        clock: Arc<dyn Clock>,
        config: Arc<AuthConfig>,
    ) -> Self {
        let policy = config.lockout_policy();
        Self {
            repo,
            notifier,
            geo,
            clock,
            config,
            policy,
        }
    }

    pub fn location_of(&self, client: &ClientInfo) -> String {
        resolve_location(self.geo.as_ref(), client.ip)
    }

    /// Record an attempt and run the lockout / anomaly logic for it
    ///
    /// Unknown users (`user == None`) are audited but never locked.
    pub async fn record_login_attempt(
        &self,
        user: Option<&User>,
        client: &ClientInfo,
        successful: bool,
    ) -> AuthResult<AttemptOutcome> {
        let attempt = self.append_attempt(user, client, successful).await?;
        let mut outcome = AttemptOutcome {
            attempt,
            locked: None,
            new_login: None,
            suspicious: false,
        };

        let Some(user) = user else {
            return Ok(outcome);
        };

        if successful {
            // Before new-login events are written, so the current location
            // is not yet part of the recent history
            if self.config.enable_suspicious_activity_detection {
                outcome.suspicious = self
                    .detect_suspicious_activity(user, client, &outcome.attempt.location)
                    .await?;
            }
            outcome.new_login = self.on_successful_login(user, &outcome.attempt).await?;
        } else {
            outcome.locked = self.on_failed_login(user, &outcome.attempt, false).await?;
        }

        Ok(outcome)
    }

    /// Refuse a login on a locked account
    ///
    /// The refusal is audited as a failed attempt and pushes `unlock_at`
    /// out by a full lock duration. Only the first lock sends mail. The
    /// returned error carries the extended expiry, or `lock`'s own when the
    /// extension could not be stored.
    pub async fn reject_locked(
        &self,
        user: &User,
        client: &ClientInfo,
        lock: AccountLock,
    ) -> AuthError {
        let extended = async {
            let attempt = self.append_attempt(Some(user), client, false).await?;
            self.on_failed_login(user, &attempt, true).await
        }
        .await;

        let until = match extended {
            Ok(Some(extended)) => extended.unlock_at,
            Ok(None) => lock.unlock_at,
            Err(e) => {
                tracing::warn!(user_id = %user.user_id, error = %e, "Failed to extend account lock");
                lock.unlock_at
            }
        };
        AuthError::account_locked(until, self.clock.now())
    }

    async fn append_attempt(
        &self,
        user: Option<&User>,
        client: &ClientInfo,
        successful: bool,
    ) -> AuthResult<LoginAttempt> {
        let attempt = LoginAttempt::new(
            user.map(|u| u.user_id),
            client.ip_string(),
            client.user_agent.clone(),
            self.location_of(client),
            successful,
            self.clock.now(),
        );
        bounded(
            &self.config,
            "record_login_attempt",
            self.repo.record_login_attempt(&attempt),
        )
        .await?;
        Ok(attempt)
    }

    async fn on_successful_login(
        &self,
        user: &User,
        attempt: &LoginAttempt,
    ) -> AuthResult<Option<SecurityEventType>> {
        // +1: the history includes the attempt just recorded
        let recent = bounded(
            &self.config,
            "recent_login_attempts",
            self.repo
                .recent_login_attempts(&user.user_id, DEVICE_HISTORY + 1),
        )
        .await?;

        let Some(event_type) = self.policy.detect_new_login(attempt, &recent) else {
            return Ok(None);
        };

        let device = describe_device(attempt.user_agent.as_deref());
        let description = match event_type {
            SecurityEventType::NewLocationLogin => {
                format!("Login from new location: {}", attempt.location)
            }
            _ => format!("Login from new device: {device}"),
        };
        self.record_event(
            user.user_id,
            event_type,
            attempt.ip_address.clone(),
            attempt.user_agent.clone(),
            attempt.location.clone(),
            description,
        )
        .await;

        tracing::info!(
            user_id = %user.user_id,
            event = %event_type,
            location = %attempt.location,
            "Login from unrecognized device or location"
        );

        if self.config.enable_login_notifications {
            let notice = LoginNotice {
                device,
                location: attempt.location.clone(),
                ip_address: attempt.ip_address.clone(),
                at: attempt.attempted_at,
            };
            best_effort(
                &self.config,
                "send_login_notification",
                self.notifier.send_login_notification(user, &notice),
            )
            .await;
        }

        Ok(Some(event_type))
    }

    /// Lock once the failures in the window reach the threshold
    ///
    /// With `already_locked` the existing lock is re-upserted from `now`
    /// whatever the count, without a second event or email.
    async fn on_failed_login(
        &self,
        user: &User,
        attempt: &LoginAttempt,
        already_locked: bool,
    ) -> AuthResult<Option<AccountLock>> {
        let recent = bounded(
            &self.config,
            "recent_login_attempts",
            self.repo
                .recent_login_attempts(&user.user_id, FAILURE_HISTORY),
        )
        .await?;

        let now = self.clock.now();
        let failed = self.policy.failed_attempts_within(&recent, now);
        if !already_locked && !self.policy.should_lock(failed) {
            tracing::debug!(user_id = %user.user_id, failed, "Failed login below lockout threshold");
            return Ok(None);
        }

        let lock = AccountLock::new(
            user.user_id,
            now,
            self.policy.unlock_at(now),
            self.policy.lock_reason(failed),
            SYSTEM_ACTOR,
        );
        // Single-statement upsert: concurrent triggers leave one row
        let lock = critical(&self.config, "lock_account", self.repo.lock_account(&lock)).await?;

        if already_locked {
            tracing::info!(
                user_id = %user.user_id,
                failed,
                unlock_at = %lock.unlock_at,
                "Account lock extended by attempt while locked"
            );
            return Ok(Some(lock));
        }

        tracing::warn!(
            user_id = %user.user_id,
            failed,
            unlock_at = %lock.unlock_at,
            "Account locked after repeated failed logins"
        );

        self.record_event(
            user.user_id,
            SecurityEventType::AccountLocked,
            attempt.ip_address.clone(),
            attempt.user_agent.clone(),
            attempt.location.clone(),
            lock.reason.clone(),
        )
        .await;

        best_effort(
            &self.config,
            "send_account_locked_email",
            self.notifier
                .send_account_locked_email(user, lock.unlock_at, failed),
        )
        .await;

        Ok(Some(lock))
    }

    /// Active lock, if any
    pub async fn is_account_locked(&self, user_id: &UserId) -> AuthResult<Option<AccountLock>> {
        critical(
            &self.config,
            "account_lock",
            self.repo.account_lock(user_id, self.clock.now()),
        )
        .await
    }

    /// Administrative unlock; returns false if the account was not locked
    pub async fn unlock_account(
        &self,
        user_id: &UserId,
        actor: &str,
        client: &ClientInfo,
    ) -> AuthResult<bool> {
        let removed = bounded(
            &self.config,
            "unlock_account",
            self.repo.unlock_account(user_id),
        )
        .await?;

        if removed {
            tracing::info!(user_id = %user_id, actor, "Account unlocked");
            self.record_event(
                *user_id,
                SecurityEventType::AccountUnlocked,
                client.ip_string(),
                client.user_agent.clone(),
                self.location_of(client),
                format!("Account unlocked by {actor}"),
            )
            .await;
        }
        Ok(removed)
    }

    /// Flags logins from a location outside several recent distinct ones
    ///
    /// Advisory only: emits an event and an email, never locks.
    pub async fn detect_suspicious_activity(
        &self,
        user: &User,
        client: &ClientInfo,
        location: &str,
    ) -> AuthResult<bool> {
        let events = bounded(
            &self.config,
            "security_events",
            self.repo.security_events(&user.user_id, EVENT_HISTORY),
        )
        .await?;

        if !self
            .policy
            .is_suspicious(&events, self.clock.now(), location)
        {
            return Ok(false);
        }

        tracing::warn!(user_id = %user.user_id, location, "Suspicious login activity");

        self.record_event(
            user.user_id,
            SecurityEventType::SuspiciousActivity,
            client.ip_string(),
            client.user_agent.clone(),
            location.to_string(),
            format!("Login from {location} after activity in several other locations"),
        )
        .await;

        let ip = client.ip_string();
        best_effort(
            &self.config,
            "send_suspicious_activity_email",
            self.notifier
                .send_suspicious_activity_email(user, location, ip.as_deref()),
        )
        .await;

        Ok(true)
    }

    pub async fn notify_password_changed(&self, user: &User, client: &ClientInfo) {
        self.log_event(
            user.user_id,
            SecurityEventType::PasswordChanged,
            client,
            "Password changed",
        )
        .await;
        best_effort(
            &self.config,
            "send_password_changed_email",
            self.notifier.send_password_changed_email(user),
        )
        .await;
    }

    pub async fn security_events(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> AuthResult<Vec<SecurityEvent>> {
        bounded(
            &self.config,
            "security_events",
            self.repo.security_events(user_id, limit),
        )
        .await
    }

    /// Best-effort event from the current request context
    pub async fn log_event(
        &self,
        user_id: UserId,
        event_type: SecurityEventType,
        client: &ClientInfo,
        description: impl Into<String>,
    ) {
        self.record_event(
            user_id,
            event_type,
            client.ip_string(),
            client.user_agent.clone(),
            self.location_of(client),
            description.into(),
        )
        .await;
    }

    async fn record_event(
        &self,
        user_id: UserId,
        event_type: SecurityEventType,
        ip_address: Option<String>,
        user_agent: Option<String>,
        location: String,
        description: String,
    ) {
        let event = SecurityEvent::new(
            user_id,
            event_type,
            ip_address,
            user_agent,
            location,
            description,
            self.clock.now(),
        );
        best_effort(
            &self.config,
            "record_security_event",
            self.repo.record_security_event(&event),
        )
        .await;
    }
}
