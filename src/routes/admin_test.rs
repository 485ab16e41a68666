use super::*;
use crate::services::auth::AuthError;

#[test]
fn account_error_statuses() {
    assert_eq!(account_error(AccountError::NotFound(Uuid::nil())).status, StatusCode::NOT_FOUND);
    assert_eq!(account_error(AccountError::EmailTaken).status, StatusCode::CONFLICT);
    assert_eq!(account_error(AccountError::InvalidDays).status, StatusCode::BAD_REQUEST);
    assert_eq!(account_error(AccountError::Suspended).status, StatusCode::FORBIDDEN);
}

#[test]
fn account_error_delegates_auth_errors() {
    let err = account_error(AccountError::Auth(AuthError::WeakPassword));
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.code, "E_WEAK_PASSWORD");
}

#[test]
fn subscription_error_statuses() {
    assert_eq!(subscription_error(SubscriptionError::Invalid("email")).status, StatusCode::BAD_REQUEST);
    assert_eq!(subscription_error(SubscriptionError::NotFound(Uuid::nil())).status, StatusCode::NOT_FOUND);
    assert_eq!(
        subscription_error(SubscriptionError::AlreadyDecided("approved".into())).status,
        StatusCode::CONFLICT
    );
    let taken = subscription_error(SubscriptionError::Account(AccountError::EmailTaken));
    assert_eq!(taken.status, StatusCode::CONFLICT);
    assert_eq!(taken.code, "E_EMAIL_TAKEN");
}

#[test]
fn approve_body_may_be_empty() {
    assert_eq!(parse_approve_body(b"").map(|b| b.days).ok(), Some(None));
    assert_eq!(parse_approve_body(b"  \n").map(|b| b.days).ok(), Some(None));
    assert_eq!(parse_approve_body(br#"{"days": 90}"#).map(|b| b.days).ok(), Some(Some(90)));
    let err = parse_approve_body(b"{nope").err().map(|e| e.status);
    assert_eq!(err, Some(StatusCode::BAD_REQUEST));
}
