use super::*;

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

// =============================================================================
// tokens
// =============================================================================

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token(), generate_token());
}

#[test]
fn generate_ws_ticket_is_32_hex_chars() {
    let ticket = generate_ws_ticket();
    assert_eq!(ticket.len(), 32);
    assert!(ticket.chars().all(|c| c.is_ascii_hexdigit()));
}

// =============================================================================
// Role
// =============================================================================

#[test]
fn role_round_trips_through_text() {
    for role in [Role::Owner, Role::Admin] {
        assert_eq!(Role::parse(role.as_str()), Some(role));
    }
    assert_eq!(Role::parse("root"), None);
}

#[test]
fn session_principal_serializes_role_lowercase() {
    let principal = SessionPrincipal {
        id: Uuid::nil(),
        role: Role::Admin,
        email: "root@signdeck.test".into(),
        name: None,
    };
    let json = serde_json::to_value(&principal).unwrap();
    assert_eq!(json["role"], "admin");
    assert_eq!(json["email"], "root@signdeck.test");
}

// =============================================================================
// live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn ws_ticket_is_single_use() {
    use crate::state::test_helpers::{integration_pool, seed_account};
    let pool = integration_pool().await;
    let account_id = seed_account(&pool, "active").await;
    let ticket = create_ws_ticket(&pool, account_id).await.expect("ticket insert");
    assert_eq!(consume_ws_ticket(&pool, &ticket).await.expect("consume"), Some(account_id));
    assert_eq!(consume_ws_ticket(&pool, &ticket).await.expect("consume again"), None);
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn session_round_trip_resolves_owner() {
    use crate::state::test_helpers::{integration_pool, seed_account};
    let pool = integration_pool().await;
    let account_id = seed_account(&pool, "active").await;
    let token = create_session(&pool, account_id, Role::Owner, 1).await.expect("session insert");
    let principal = validate_session(&pool, &token)
        .await
        .expect("validate")
        .expect("session should resolve");
    assert_eq!(principal.id, account_id);
    assert_eq!(principal.role, Role::Owner);

    delete_session(&pool, &token).await.expect("delete");
    assert!(validate_session(&pool, &token).await.expect("validate").is_none());
}
