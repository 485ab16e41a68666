//! Password authentication for account owners and super-admins.
//!
//! Passwords are stored as argon2id PHC strings. Login checks the admin
//! table first, then accounts; both paths run a full verify even when the
//! email is unknown so timing does not reveal which addresses exist.

use std::sync::LazyLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::session::Role;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 256;
const TEMP_PASSWORD_LEN: usize = 12;
const TEMP_PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789";

/// Verified against when the email matches nobody.
static DUMMY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password(&generate_temporary_password()).unwrap_or_default());

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::WeakPassword => "E_WEAK_PASSWORD",
            Self::Hash(_) => "E_PASSWORD_HASH",
            Self::Db(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Db(_))
    }
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return None;
    }
    let parts = normalized.split('@').collect::<Vec<_>>();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() || !parts[1].contains('.') {
        return None;
    }
    Some(normalized)
}

/// Reject passwords outside the accepted length range.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword`.
pub fn check_password_policy(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

/// Hash a password into an argon2id PHC string.
///
/// # Errors
///
/// Returns `AuthError::Hash` if argon2 rejects the parameters.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Compare a password against a stored PHC string. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[must_use]
pub fn generate_temporary_password() -> String {
    let mut rng = rand::rng();
    (0..TEMP_PASSWORD_LEN)
        .map(|_| {
            let idx = rng.random_range(0..TEMP_PASSWORD_ALPHABET.len());
            TEMP_PASSWORD_ALPHABET[idx] as char
        })
        .collect()
}

// =============================================================================
// DATABASE OPERATIONS
// =============================================================================

/// Resolve credentials to a principal.
///
/// # Errors
///
/// Returns `InvalidCredentials` for any mismatch, including unknown emails.
pub async fn login(pool: &PgPool, email: &str, password: &str) -> Result<(Uuid, Role), AuthError> {
    let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;

    let row = sqlx::query(
        r"SELECT id, password_hash, 'admin' AS role FROM admins WHERE email = $1
          UNION ALL
          SELECT id, password_hash, 'owner' AS role FROM accounts WHERE email = $1
          LIMIT 1",
    )
    .bind(&email)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        let _ = verify_password(password, &DUMMY_HASH);
        return Err(AuthError::InvalidCredentials);
    };

    let stored: String = row.get("password_hash");
    if !verify_password(password, &stored) {
        return Err(AuthError::InvalidCredentials);
    }
    let role: String = row.get("role");
    let role = Role::parse(&role).ok_or(AuthError::InvalidCredentials)?;
    Ok((row.get("id"), role))
}

/// Change a principal's password after re-checking the current one.
///
/// # Errors
///
/// Returns `InvalidCredentials` if `current` does not match, `WeakPassword`
/// if `new` violates policy.
pub async fn change_password(
    pool: &PgPool,
    principal_id: Uuid,
    role: Role,
    current: &str,
    new: &str,
) -> Result<(), AuthError> {
    check_password_policy(new)?;
    let table = principal_table(role);

    let stored: Option<String> = sqlx::query_scalar(&format!("SELECT password_hash FROM {table} WHERE id = $1"))
        .bind(principal_id)
        .fetch_optional(pool)
        .await?;
    let Some(stored) = stored else {
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(current, &stored) {
        return Err(AuthError::InvalidCredentials);
    }

    let hash = hash_password(new)?;
    sqlx::query(&format!("UPDATE {table} SET password_hash = $2 WHERE id = $1"))
        .bind(principal_id)
        .bind(hash)
        .execute(pool)
        .await?;
    tracing::info!(%principal_id, role = role.as_str(), "password changed");
    Ok(())
}

/// Create the configured super-admin if no admin with that email exists.
///
/// # Errors
///
/// Returns an error if the email is invalid or the insert fails.
pub async fn ensure_bootstrap_admin(pool: &PgPool, email: &str, password: &str) -> Result<bool, AuthError> {
    let email = normalize_email(email).ok_or(AuthError::InvalidEmail)?;
    check_password_policy(password)?;
    let hash = hash_password(password)?;

    let inserted = sqlx::query(
        "INSERT INTO admins (email, password_hash) VALUES ($1, $2)
         ON CONFLICT (email) DO NOTHING",
    )
    .bind(&email)
    .bind(hash)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted > 0 {
        tracing::info!(%email, "bootstrap admin created");
    }
    Ok(inserted > 0)
}

fn principal_table(role: Role) -> &'static str {
    match role {
        Role::Owner => "accounts",
        Role::Admin => "admins",
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
