//! Lockout Policy
//!
//! Pure decisions over login history and security events. No I/O and no
//! clock: callers pass `now`.
//!
//! An account is locked while a lock row exists with `unlock_at > now`;
//! nothing polls for expiry.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::domain::entity::{
    login_attempt::LoginAttempt,
    security_event::{SecurityEvent, SecurityEventType},
};

/// Attempts inspected when counting failures
pub const FAILURE_HISTORY: usize = 10;
/// Attempts inspected for new-device / new-location detection
pub const DEVICE_HISTORY: usize = 5;
/// Events inspected for suspicious-activity detection
pub const EVENT_HISTORY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    /// Trailing window over which failures are counted
    pub failure_window: Duration,
    pub lock_duration: Duration,
    pub suspicious_window: Duration,
    /// Distinct recent locations that make a login from yet another one suspicious
    pub suspicious_location_threshold: usize,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            failure_window: Duration::hours(1),
            lock_duration: Duration::minutes(30),
            suspicious_window: Duration::hours(24),
            suspicious_location_threshold: 3,
        }
    }
}

impl LockoutPolicy {
    /// Failed attempts inside the trailing window
    pub fn failed_attempts_within(&self, attempts: &[LoginAttempt], now: DateTime<Utc>) -> u32 {
        let since = now - self.failure_window;
        attempts
            .iter()
            .filter(|a| !a.successful && a.attempted_at > since)
            .count() as u32
    }

    pub fn should_lock(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_failed_attempts
    }

    pub fn unlock_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.lock_duration
    }

    pub fn lock_reason(&self, failed_attempts: u32) -> String {
        format!("Too many failed login attempts ({failed_attempts})")
    }

    /// Classify a successful login against earlier ones
    ///
    /// `recent` is newest-first history that may include `current`, which is
    /// skipped by id. Only successful attempts count as known devices and
    /// locations; with no earlier successful login nothing is flagged. A new
    /// location takes precedence over a new device.
    pub fn detect_new_login(
        &self,
        current: &LoginAttempt,
        recent: &[LoginAttempt],
    ) -> Option<SecurityEventType> {
        let previous: Vec<&LoginAttempt> = recent
            .iter()
            .filter(|a| a.id != current.id && a.successful)
            .take(DEVICE_HISTORY)
            .collect();

        if previous.is_empty() {
            return None;
        }

        let known_location = previous.iter().any(|a| a.location == current.location);
        let known_device = previous.iter().any(|a| a.user_agent == current.user_agent);

        if !known_location {
            Some(SecurityEventType::NewLocationLogin)
        } else if !known_device {
            Some(SecurityEventType::NewDeviceLogin)
        } else {
            None
        }
    }

    /// Activity from several distinct locations within the window, none of
    /// them the current one
    pub fn is_suspicious(
        &self,
        recent_events: &[SecurityEvent],
        now: DateTime<Utc>,
        current_location: &str,
    ) -> bool {
        let since = now - self.suspicious_window;
        let locations: HashSet<&str> = recent_events
            .iter()
            .filter(|e| e.created_at > since && !e.location.is_empty())
            .map(|e| e.location.as_str())
            .collect();

        locations.len() >= self.suspicious_location_threshold
            && !locations.contains(current_location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::id::UserId;

    fn attempt(
        user_id: UserId,
        successful: bool,
        at: DateTime<Utc>,
        ua: &str,
        location: &str,
    ) -> LoginAttempt {
        LoginAttempt::new(
            Some(user_id),
            Some("203.0.113.9".into()),
            Some(ua.into()),
            location,
            successful,
            at,
        )
    }

    fn event(user_id: UserId, location: &str, at: DateTime<Utc>) -> SecurityEvent {
        SecurityEvent::new(
            user_id,
            SecurityEventType::LoginSuccess,
            None,
            None,
            location,
            "",
            at,
        )
    }

    #[test]
    fn test_counts_only_recent_failures() {
        let policy = LockoutPolicy::default();
        let user = UserId::new();
        let now = Utc::now();

        let history = vec![
            attempt(user, false, now - Duration::minutes(1), "ua", "x"),
            attempt(user, true, now - Duration::minutes(2), "ua", "x"),
            attempt(user, false, now - Duration::minutes(30), "ua", "x"),
            attempt(user, false, now - Duration::minutes(61), "ua", "x"),
        ];
        assert_eq!(policy.failed_attempts_within(&history, now), 2);
    }

    #[test]
    fn test_threshold() {
        let policy = LockoutPolicy::default();
        assert!(!policy.should_lock(4));
        assert!(policy.should_lock(5));
        assert!(policy.should_lock(9));
        assert_eq!(policy.lock_reason(5), "Too many failed login attempts (5)");
    }

    #[test]
    fn test_first_login_is_not_new_device() {
        let policy = LockoutPolicy::default();
        let user = UserId::new();
        let current = attempt(user, true, Utc::now(), "Firefox", "Lisbon, Portugal");
        assert_eq!(policy.detect_new_login(&current, &[current.clone()]), None);
    }

    #[test]
    fn test_new_device_and_location() {
        let policy = LockoutPolicy::default();
        let user = UserId::new();
        let now = Utc::now();
        let earlier = attempt(user, true, now - Duration::days(1), "Firefox", "Lisbon, Portugal");

        let same = attempt(user, true, now, "Firefox", "Lisbon, Portugal");
        assert_eq!(
            policy.detect_new_login(&same, &[same.clone(), earlier.clone()]),
            None
        );

        let new_device = attempt(user, true, now, "Chrome", "Lisbon, Portugal");
        assert_eq!(
            policy.detect_new_login(&new_device, &[new_device.clone(), earlier.clone()]),
            Some(SecurityEventType::NewDeviceLogin)
        );

        let new_both = attempt(user, true, now, "Chrome", "Oslo, Norway");
        assert_eq!(
            policy.detect_new_login(&new_both, &[new_both.clone(), earlier]),
            Some(SecurityEventType::NewLocationLogin)
        );
    }

    #[test]
    fn test_failed_attempts_are_not_known_devices() {
        let policy = LockoutPolicy::default();
        let user = UserId::new();
        let now = Utc::now();
        let ok = attempt(user, true, now - Duration::days(2), "Firefox", "Lisbon, Portugal");
        let failed = attempt(user, false, now - Duration::hours(1), "Chrome", "Lisbon, Portugal");

        let current = attempt(user, true, now, "Chrome", "Lisbon, Portugal");
        assert_eq!(
            policy.detect_new_login(&current, &[current.clone(), failed, ok]),
            Some(SecurityEventType::NewDeviceLogin)
        );
    }

    #[test]
    fn test_suspicious_locations() {
        let policy = LockoutPolicy::default();
        let user = UserId::new();
        let now = Utc::now();
        let events = vec![
            event(user, "Lisbon, Portugal", now - Duration::hours(1)),
            event(user, "Oslo, Norway", now - Duration::hours(2)),
            event(user, "Lima, Peru", now - Duration::hours(3)),
            event(user, "Quito, Ecuador", now - Duration::hours(30)),
        ];

        assert!(policy.is_suspicious(&events, now, "Tokyo, Japan"));
        assert!(!policy.is_suspicious(&events, now, "Oslo, Norway"));
        assert!(!policy.is_suspicious(&events[..2], now, "Tokyo, Japan"));
    }
}
