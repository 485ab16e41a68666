use super::*;
use crate::frame::ErrorCode;
use time::Duration;

fn sample(status: AccountStatus, expires_in: Option<Duration>, now: OffsetDateTime) -> Account {
    Account {
        id: Uuid::new_v4(),
        name: "Acme".into(),
        email: "owner@acme.test".into(),
        status,
        activated_at: Some(now - Duration::days(1)),
        expires_at: expires_in.map(|d| now + d),
        utc_offset_minutes: 120,
        created_at: now - Duration::days(1),
    }
}

#[test]
fn days_must_be_positive_and_bounded() {
    assert!(matches!(check_days(0), Err(AccountError::InvalidDays)));
    assert!(matches!(check_days(-3), Err(AccountError::InvalidDays)));
    assert!(matches!(check_days(MAX_ACTIVATION_DAYS + 1), Err(AccountError::InvalidDays)));
    assert_eq!(check_days(30).unwrap(), 30);
}

#[test]
fn offsets_follow_real_timezones() {
    assert!(check_offset(-720).is_ok());
    assert!(check_offset(840).is_ok());
    assert!(matches!(check_offset(900), Err(AccountError::InvalidOffset)));
}

#[test]
fn names_are_trimmed_and_required() {
    assert_eq!(check_name("  Acme  ").unwrap(), "Acme");
    assert!(matches!(check_name("   "), Err(AccountError::InvalidName)));
}

#[test]
fn view_flattens_account_and_computes_fields() {
    let now = OffsetDateTime::now_utc();
    let account = sample(AccountStatus::Active, Some(Duration::hours(36)), now);
    let json = serde_json::to_value(AccountView::new(account, now)).unwrap();
    assert_eq!(json["status"], "active");
    assert_eq!(json["serviceability"], "active");
    assert_eq!(json["days_remaining"], 2);
    assert_eq!(json["utc_offset_minutes"], 120);
}

#[test]
fn view_marks_expired_window() {
    let now = OffsetDateTime::now_utc();
    let account = sample(AccountStatus::Active, Some(-Duration::hours(1)), now);
    let view = AccountView::new(account, now);
    assert_eq!(view.serviceability, Serviceability::Expired);
    assert_eq!(view.days_remaining, Some(0));
}

#[test]
fn error_codes_are_grepable() {
    assert_eq!(AccountError::NotFound(Uuid::nil()).error_code(), "E_ACCOUNT_NOT_FOUND");
    assert_eq!(AccountError::Suspended.error_code(), "E_ACCOUNT_SUSPENDED");
    assert_eq!(AccountError::Auth(AuthError::WeakPassword).error_code(), "E_WEAK_PASSWORD");
    assert!(!AccountError::EmailTaken.retryable());
}

// =============================================================================
// live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
fn new_account(email: &str, activate_days: Option<i64>) -> NewAccount {
    NewAccount {
        name: "Acme".into(),
        email: email.into(),
        password: "hunter2hunter2".into(),
        activate_days,
        utc_offset_minutes: Some(60),
    }
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn lifecycle_create_activate_extend_suspend() {
    use crate::state::test_helpers::integration_pool;
    let pool = integration_pool().await;

    let pending = create(&pool, &new_account("lifecycle@acme.test", None)).await.expect("create");
    assert_eq!(pending.status, AccountStatus::Pending);
    assert!(pending.expires_at.is_none());

    let active = activate(&pool, pending.id, 10).await.expect("activate");
    assert_eq!(active.status, AccountStatus::Active);
    let first_end = active.expires_at.expect("window end");

    let extended = extend(&pool, pending.id, 5).await.expect("extend");
    let pushed = extended.expires_at.expect("window end") - first_end;
    assert!((pushed - Duration::days(5)).abs() < Duration::seconds(5));

    let suspended = suspend(&pool, pending.id).await.expect("suspend");
    assert_eq!(suspended.status, AccountStatus::Suspended);
    assert!(matches!(ensure_writable(&pool, pending.id).await, Err(AccountError::Suspended)));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn duplicate_email_is_rejected() {
    use crate::state::test_helpers::integration_pool;
    let pool = integration_pool().await;
    create(&pool, &new_account("dup@acme.test", Some(30))).await.expect("first create");
    let second = create(&pool, &new_account("DUP@acme.test", Some(30))).await;
    assert!(matches!(second, Err(AccountError::EmailTaken)));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn suspend_expired_only_touches_closed_windows() {
    use crate::state::test_helpers::integration_pool;
    let pool = integration_pool().await;
    let open = create(&pool, &new_account("open@acme.test", Some(30))).await.expect("create");
    let closed = create(&pool, &new_account("closed@acme.test", Some(1))).await.expect("create");
    sqlx::query("UPDATE accounts SET expires_at = now() - interval '1 minute' WHERE id = $1")
        .bind(closed.id)
        .execute(&pool)
        .await
        .expect("backdate");

    let changed = suspend_expired(&pool).await.expect("sweep");
    assert_eq!(changed.iter().map(|a| a.id).collect::<Vec<_>>(), vec![closed.id]);
    assert_eq!(get(&pool, open.id).await.expect("get").status, AccountStatus::Active);
}
