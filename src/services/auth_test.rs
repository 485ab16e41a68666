use super::*;

#[test]
fn normalize_email_accepts_basic_address() {
    assert_eq!(normalize_email("  Owner@Acme.Test "), Some("owner@acme.test".to_owned()));
}

#[test]
fn normalize_email_rejects_invalid_values() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("owner"), None);
    assert_eq!(normalize_email("@acme.test"), None);
    assert_eq!(normalize_email("owner@"), None);
    assert_eq!(normalize_email("a@b@c.test"), None);
    assert_eq!(normalize_email("owner@localhost"), None);
}

#[test]
fn password_policy_bounds() {
    assert!(matches!(check_password_policy("short"), Err(AuthError::WeakPassword)));
    assert!(check_password_policy("long enough").is_ok());
    assert!(matches!(check_password_policy(&"x".repeat(300)), Err(AuthError::WeakPassword)));
}

#[test]
fn hash_then_verify_matches_only_original() {
    let hash = hash_password("correct horse").unwrap();
    assert!(hash.starts_with("$argon2id$"));
    assert!(verify_password("correct horse", &hash));
    assert!(!verify_password("wrong horse", &hash));
}

#[test]
fn hashes_are_salted() {
    let a = hash_password("same password").unwrap();
    let b = hash_password("same password").unwrap();
    assert_ne!(a, b);
}

#[test]
fn malformed_hash_never_verifies() {
    assert!(!verify_password("anything", "not-a-phc-string"));
    assert!(!verify_password("anything", ""));
}

#[test]
fn temporary_password_shape() {
    let pw = generate_temporary_password();
    assert_eq!(pw.len(), TEMP_PASSWORD_LEN);
    assert!(pw.bytes().all(|b| TEMP_PASSWORD_ALPHABET.contains(&b)));
    assert!(check_password_policy(&pw).is_ok());
}

#[test]
fn error_codes() {
    use crate::frame::ErrorCode;
    assert_eq!(AuthError::InvalidCredentials.error_code(), "E_INVALID_CREDENTIALS");
    assert!(!AuthError::InvalidCredentials.retryable());
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn bootstrap_admin_can_log_in_once_created() {
    use crate::state::test_helpers::integration_pool;
    let pool = integration_pool().await;
    assert!(ensure_bootstrap_admin(&pool, "Root@Signdeck.test", "super-secret").await.expect("bootstrap"));
    assert!(!ensure_bootstrap_admin(&pool, "root@signdeck.test", "super-secret").await.expect("idempotent"));

    let (_, role) = login(&pool, "root@signdeck.test", "super-secret").await.expect("login");
    assert_eq!(role, Role::Admin);
    assert!(matches!(
        login(&pool, "root@signdeck.test", "nope-nope").await,
        Err(AuthError::InvalidCredentials)
    ));
}
