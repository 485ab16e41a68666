//! Session and WS-ticket management.
//!
//! ARCHITECTURE
//! ============
//! HTTP auth uses session tokens carried in an HttpOnly cookie, while the
//! owner feed socket uses one-time short-lived tickets to avoid sending
//! cookies over WS query params. Both account owners and super-admins hold
//! sessions; the `role` column says which table `principal_id` points at.
//!
//! TRADE-OFFS
//! ==========
//! Ticket consumption is destructive (`DELETE ... RETURNING`) to guarantee
//! single use; this favors replay safety over reconnect convenience.

use std::fmt::Write;

use rand::Rng;
use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Generate a short-lived 16-byte hex WS ticket.
#[must_use]
pub(crate) fn generate_ws_ticket() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Principal resolved from a valid session token.
#[derive(Debug, Clone, Serialize)]
pub struct SessionPrincipal {
    /// Account id for owners, admin id for admins.
    pub id: Uuid,
    pub role: Role,
    pub email: String,
    /// Account display name; `None` for admins.
    pub name: Option<String>,
}

/// Create a session for the given principal, returning the token.
pub async fn create_session(pool: &PgPool, principal_id: Uuid, role: Role, ttl_hours: i64) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query(
        "INSERT INTO sessions (token, principal_id, role, expires_at)
         VALUES ($1, $2, $3, now() + make_interval(hours => $4))",
    )
    .bind(&token)
    .bind(principal_id)
    .bind(role.as_str())
    .bind(i32::try_from(ttl_hours).unwrap_or(i32::MAX))
    .execute(pool)
    .await?;
    Ok(token)
}

/// Validate a session token and return the associated principal.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionPrincipal>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT
              s.principal_id,
              s.role,
              COALESCE(a.email, ad.email) AS email,
              a.name
          FROM sessions s
          LEFT JOIN accounts a ON s.role = 'owner' AND a.id = s.principal_id
          LEFT JOIN admins ad ON s.role = 'admin' AND ad.id = s.principal_id
          WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let email: Option<String> = row.get("email");
    let role: String = row.get("role");
    // Principal deleted out from under the session.
    let (Some(email), Some(role)) = (email, Role::parse(&role)) else {
        return Ok(None);
    };

    Ok(Some(SessionPrincipal { id: row.get("principal_id"), role, email, name: row.get("name") }))
}

/// Delete a session by token.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop every session of a principal except `keep`, e.g. after a password change.
pub async fn delete_other_sessions(pool: &PgPool, principal_id: Uuid, keep: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE principal_id = $1 AND token <> $2")
        .bind(principal_id)
        .bind(keep)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Create a short-lived WS ticket for the given account.
pub async fn create_ws_ticket(pool: &PgPool, account_id: Uuid) -> Result<String, sqlx::Error> {
    let ticket = generate_ws_ticket();
    sqlx::query("INSERT INTO ws_tickets (ticket, account_id) VALUES ($1, $2)")
        .bind(&ticket)
        .bind(account_id)
        .execute(pool)
        .await?;
    Ok(ticket)
}

/// Consume a WS ticket atomically, returning the `account_id` if valid.
pub async fn consume_ws_ticket(pool: &PgPool, ticket: &str) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query("DELETE FROM ws_tickets WHERE ticket = $1 AND expires_at > now() RETURNING account_id")
        .bind(ticket)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get("account_id")))
}

/// Remove expired sessions and tickets. Returns `(sessions, tickets)` deleted.
pub async fn purge_expired(pool: &PgPool) -> Result<(u64, u64), sqlx::Error> {
    let sessions = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?
        .rows_affected();
    let tickets = sqlx::query("DELETE FROM ws_tickets WHERE expires_at <= now()")
        .execute(pool)
        .await?
        .rows_affected();
    Ok((sessions, tickets))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
