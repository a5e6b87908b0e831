//! Account lockout, audit trail and login anomaly detection

mod common;

use auth::application::AuthConfig;
use auth::domain::entity::security_event::SecurityEventType;
use auth::domain::entity::user::User;
use auth::domain::repository::SecurityRepository;
use auth::error::AuthError;
use chrono::Duration;
use common::{AUSTIN, BERLIN, FIREFOX, Harness, PARIS, PASSWORD, SAFARI_IOS, Sent, TOKYO, client};

const EMAIL: &str = "ada@example.com";

async fn stored_unlock_at(h: &Harness, user: &User) -> Option<chrono::DateTime<chrono::Utc>> {
    h.repo
        .account_lock(&user.user_id, h.deps.now())
        .await
        .unwrap()
        .map(|lock| lock.unlock_at)
}

async fn fail_logins(h: &Harness, times: usize) {
    for _ in 0..times {
        let err = h
            .login(EMAIL, "Wrong-Password-1", &client(TOKYO, FIREFOX))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials), "got {err:?}");
    }
}

#[tokio::test]
async fn test_fifth_failure_locks_account() {
    let h = Harness::without_rate_limit();
    let user = h.register(EMAIL).await;
    let start = h.deps.now();

    fail_logins(&h, 4).await;
    assert_eq!(h.repo.lock_count(), 0);

    fail_logins(&h, 1).await;
    assert_eq!(h.repo.lock_count(), 1);

    let err = h
        .login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX))
        .await
        .unwrap_err();
    match err {
        AuthError::AccountLocked { until, .. } => assert_eq!(until, start + Duration::minutes(30)),
        other => panic!("expected AccountLocked, got {other:?}"),
    }

    assert_eq!(
        h.notifier.count(|s| matches!(
            s,
            Sent::AccountLocked {
                failed_attempts: 5,
                ..
            }
        )),
        1
    );
    assert!(h.event_types(&user).await.contains(&SecurityEventType::AccountLocked));
}

#[tokio::test]
async fn test_lock_expires_without_intervention() {
    let h = Harness::without_rate_limit();
    h.register(EMAIL).await;
    fail_logins(&h, 5).await;

    h.advance(Duration::minutes(31));
    assert!(h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await.is_ok());
}

#[tokio::test]
async fn test_lock_holds_under_default_throttle() {
    let h = Harness::new();
    let user = h.register(EMAIL).await;
    let start = h.deps.now();

    fail_logins(&h, 5).await;

    for password in [PASSWORD, "Wrong-Password-1"] {
        let err = h
            .login(EMAIL, password, &client(TOKYO, FIREFOX))
            .await
            .unwrap_err();
        match err {
            AuthError::AccountLocked { until, retry_after } => {
                assert_eq!(until, start + Duration::minutes(30));
                assert_eq!(retry_after, std::time::Duration::from_secs(30 * 60));
            }
            other => panic!("expected AccountLocked, got {other:?}"),
        }
    }
    assert_eq!(stored_unlock_at(&h, &user).await, Some(start + Duration::minutes(30)));

    h.advance(Duration::minutes(31));
    assert!(h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await.is_ok());
}

#[tokio::test]
async fn test_failures_outside_window_do_not_count() {
    let h = Harness::without_rate_limit();
    h.register(EMAIL).await;

    fail_logins(&h, 4).await;
    h.advance(Duration::minutes(61));
    fail_logins(&h, 1).await;

    assert_eq!(h.repo.lock_count(), 0);
    assert!(h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await.is_ok());
}

#[tokio::test]
async fn test_attempt_while_locked_extends_lock() {
    let h = Harness::without_rate_limit();
    let user = h.register(EMAIL).await;
    let start = h.deps.now();
    fail_logins(&h, 5).await;
    assert_eq!(stored_unlock_at(&h, &user).await, Some(start + Duration::minutes(30)));
    let attempts_before = h.repo.login_attempts().len();

    h.advance(Duration::minutes(10));
    let err = h
        .login(EMAIL, "Wrong-Password-1", &client(TOKYO, FIREFOX))
        .await
        .unwrap_err();
    let extended = start + Duration::minutes(40);
    match err {
        AuthError::AccountLocked { until, .. } => assert_eq!(until, extended),
        other => panic!("expected AccountLocked, got {other:?}"),
    }
    assert_eq!(stored_unlock_at(&h, &user).await, Some(extended));
    assert_eq!(h.repo.lock_count(), 1);

    let attempts = h.repo.login_attempts();
    assert_eq!(attempts.len(), attempts_before + 1);
    let rejected = &attempts[attempts_before];
    assert!(!rejected.successful);
    assert_eq!(rejected.user_id, Some(user.user_id));

    // Still locked past the original expiry
    h.advance(Duration::minutes(25));
    assert!(matches!(
        h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await,
        Err(AuthError::AccountLocked { .. })
    ));

    // Extensions send no further lock mail or lock event
    assert_eq!(h.notifier.count(|s| matches!(s, Sent::AccountLocked { .. })), 1);
    let lock_events = h
        .event_types(&user)
        .await
        .into_iter()
        .filter(|e| *e == SecurityEventType::AccountLocked)
        .count();
    assert_eq!(lock_events, 1);

    h.advance(Duration::minutes(31));
    assert!(h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await.is_ok());
}

#[tokio::test]
async fn test_concurrent_failures_leave_one_lock_row() {
    let h = Harness::without_rate_limit();
    let user = h.register(EMAIL).await;
    fail_logins(&h, 4).await;

    let c = client(TOKYO, FIREFOX);
    let (a, b, d) = tokio::join!(
        h.login(EMAIL, "Wrong-Password-1", &c),
        h.login(EMAIL, "Wrong-Password-2", &c),
        h.login(EMAIL, "Wrong-Password-3", &c),
    );
    for result in [a, b, d] {
        assert!(result.is_err());
    }

    assert_eq!(h.repo.lock_count(), 1);
    let first_trigger = h.deps.now();
    assert_eq!(
        stored_unlock_at(&h, &user).await,
        Some(first_trigger + Duration::minutes(30))
    );

    // A later trigger moves the same row
    h.advance(Duration::minutes(5));
    let (a, b) = tokio::join!(
        h.login(EMAIL, "Wrong-Password-4", &c),
        h.login(EMAIL, PASSWORD, &c),
    );
    assert!(matches!(a, Err(AuthError::AccountLocked { .. })));
    assert!(matches!(b, Err(AuthError::AccountLocked { .. })));
    assert_eq!(h.repo.lock_count(), 1);
    assert_eq!(
        stored_unlock_at(&h, &user).await,
        Some(h.deps.now() + Duration::minutes(30))
    );
}

#[tokio::test]
async fn test_unknown_email_is_audited_without_user() {
    let h = Harness::without_rate_limit();
    h.register(EMAIL).await;

    let err = h
        .login("nobody@example.com", PASSWORD, &client(TOKYO, FIREFOX))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(err.public_message(), "Invalid email or password");

    let wrong_password = h
        .login(EMAIL, "Wrong-Password-1", &client(TOKYO, FIREFOX))
        .await
        .unwrap_err();
    assert_eq!(err.public_message(), wrong_password.public_message());

    let attempts = h.repo.login_attempts();
    assert_eq!(attempts[0].user_id, None);
    assert!(!attempts[0].successful);
    assert_eq!(attempts[0].location, "Tokyo, Japan");
}

#[tokio::test]
async fn test_unreadable_lock_state_fails_closed() {
    let h = Harness::without_rate_limit();
    h.register(EMAIL).await;
    h.repo.set_lock_reads_available(false);

    let err = h
        .login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StoreUnavailable(_)), "got {err:?}");
    assert!(h.cache.keys().iter().all(|k| !k.starts_with("session:")));
}

#[tokio::test]
async fn test_admin_unlock() {
    let h = Harness::without_rate_limit();
    let user = h.register(EMAIL).await;
    fail_logins(&h, 5).await;

    let monitor = h.deps.monitor();
    let admin = client(BERLIN, FIREFOX);
    assert!(monitor.unlock_account(&user.user_id, "admin", &admin).await.unwrap());
    assert!(!monitor.unlock_account(&user.user_id, "admin", &admin).await.unwrap());

    assert!(h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await.is_ok());

    let events = monitor.security_events(&user.user_id, 50).await.unwrap();
    let unlocked: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == SecurityEventType::AccountUnlocked)
        .collect();
    assert_eq!(unlocked.len(), 1);
    assert_eq!(unlocked[0].description, "Account unlocked by admin");
}

#[tokio::test]
async fn test_first_login_is_not_flagged() {
    let h = Harness::without_rate_limit();
    let user = h.register(EMAIL).await;

    h.login(EMAIL, PASSWORD, &client(BERLIN, SAFARI_IOS)).await.unwrap();

    assert_eq!(h.notifier.count(|s| matches!(s, Sent::LoginNotification { .. })), 0);
    let types = h.event_types(&user).await;
    assert!(!types.contains(&SecurityEventType::NewLocationLogin));
    assert!(!types.contains(&SecurityEventType::NewDeviceLogin));
}

#[tokio::test]
async fn test_new_location_and_new_device() {
    let h = Harness::without_rate_limit();
    let user = h.register(EMAIL).await;

    h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await.unwrap();
    h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await.unwrap();
    assert_eq!(h.notifier.count(|s| matches!(s, Sent::LoginNotification { .. })), 0);

    h.login(EMAIL, PASSWORD, &client(BERLIN, FIREFOX)).await.unwrap();
    let notices: Vec<_> = h
        .notifier
        .sent()
        .into_iter()
        .filter_map(|s| match s {
            Sent::LoginNotification { notice, .. } => Some(notice),
            _ => None,
        })
        .collect();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].location, "Berlin, Germany");
    assert_eq!(notices[0].device, "Desktop (Windows, Firefox)");

    h.login(EMAIL, PASSWORD, &client(TOKYO, SAFARI_IOS)).await.unwrap();

    let types = h.event_types(&user).await;
    assert!(types.contains(&SecurityEventType::NewLocationLogin));
    assert!(types.contains(&SecurityEventType::NewDeviceLogin));
    assert_eq!(h.notifier.count(|s| matches!(s, Sent::LoginNotification { .. })), 2);
}

#[tokio::test]
async fn test_failed_logins_do_not_teach_devices() {
    let h = Harness::without_rate_limit();
    let user = h.register(EMAIL).await;
    h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await.unwrap();

    // A failure from Berlin does not make Berlin a known location
    h.login(EMAIL, "Wrong-Password-1", &client(BERLIN, FIREFOX))
        .await
        .unwrap_err();
    h.login(EMAIL, PASSWORD, &client(BERLIN, FIREFOX)).await.unwrap();

    assert!(h.event_types(&user).await.contains(&SecurityEventType::NewLocationLogin));
}

#[tokio::test]
async fn test_login_notifications_can_be_disabled() {
    let h = Harness::with_config(AuthConfig {
        enable_rate_limiting: false,
        enable_login_notifications: false,
        ..AuthConfig::default()
    });
    let user = h.register(EMAIL).await;

    h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await.unwrap();
    h.login(EMAIL, PASSWORD, &client(BERLIN, FIREFOX)).await.unwrap();

    assert_eq!(h.notifier.count(|s| matches!(s, Sent::LoginNotification { .. })), 0);
    assert!(h.event_types(&user).await.contains(&SecurityEventType::NewLocationLogin));
}

#[tokio::test]
async fn test_login_after_activity_in_three_places_is_suspicious() {
    let h = Harness::without_rate_limit();
    let user = h.register(EMAIL).await;

    h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await.unwrap();
    h.login(EMAIL, PASSWORD, &client(BERLIN, FIREFOX)).await.unwrap();
    h.login(EMAIL, PASSWORD, &client(AUSTIN, FIREFOX)).await.unwrap();
    assert_eq!(h.notifier.count(|s| matches!(s, Sent::SuspiciousActivity { .. })), 0);

    // Advisory: the login itself goes through
    h.login(EMAIL, PASSWORD, &client(PARIS, FIREFOX)).await.unwrap();

    assert_eq!(
        h.notifier.count(|s| matches!(
            s,
            Sent::SuspiciousActivity { location, .. } if location == "Paris, France"
        )),
        1
    );
    assert!(h.event_types(&user).await.contains(&SecurityEventType::SuspiciousActivity));
    assert_eq!(h.repo.lock_count(), 0);
}

#[tokio::test]
async fn test_notifier_outage_does_not_block_lockout() {
    let h = Harness::without_rate_limit();
    h.register(EMAIL).await;
    h.notifier.set_failing(true);

    fail_logins(&h, 5).await;

    assert_eq!(h.repo.lock_count(), 1);
    assert!(matches!(
        h.login(EMAIL, PASSWORD, &client(TOKYO, FIREFOX)).await,
        Err(AuthError::AccountLocked { .. })
    ));
}
