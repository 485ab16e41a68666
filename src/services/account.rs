//! Tenant account lifecycle, driven by the super-admin.
//!
//! DESIGN
//! ======
//! Stored status is one of pending/active/suspended; the activation window
//! (`activated_at..expires_at`) is layered on top by
//! `Account::serviceability`. Activation always opens a fresh window from
//! now, while extension pushes the end of the existing window (or of now,
//! if it already closed) without touching status.
//!
//! Every lifecycle change publishes `account:update` on the account's own
//! feed so connected kiosks switch between content and the paused notice
//! without a reload.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::frame::ErrorCode;
use crate::model::account::{Account, AccountStatus, Serviceability};
use crate::services::auth::{self, AuthError};
use crate::services::feed::{self, FeedOp};
use crate::state::AppState;

/// Longest activation or extension a single call may grant.
pub const MAX_ACTIVATION_DAYS: i64 = 3_660;

/// UTC offsets span -12:00 to +14:00.
const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

const ACCOUNT_COLUMNS: &str = "id, name, email, status, activated_at, expires_at, utc_offset_minutes, created_at";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("account not found: {0}")]
    NotFound(Uuid),
    #[error("email already in use")]
    EmailTaken,
    #[error("invalid email")]
    InvalidEmail,
    #[error("name must not be empty")]
    InvalidName,
    #[error("days must be between 1 and {MAX_ACTIVATION_DAYS}")]
    InvalidDays,
    #[error("utc offset must be between -720 and 840 minutes")]
    InvalidOffset,
    #[error("account is suspended")]
    Suspended,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return Self::EmailTaken;
            }
        }
        Self::Database(err)
    }
}

impl ErrorCode for AccountError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_ACCOUNT_NOT_FOUND",
            Self::EmailTaken => "E_EMAIL_TAKEN",
            Self::InvalidEmail | Self::InvalidName | Self::InvalidDays | Self::InvalidOffset => "E_INVALID_ACCOUNT",
            Self::Suspended => "E_ACCOUNT_SUSPENDED",
            Self::Auth(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Account plus fields computed at read time.
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    pub serviceability: Serviceability,
    pub days_remaining: Option<i64>,
}

impl AccountView {
    #[must_use]
    pub fn new(account: Account, now: OffsetDateTime) -> Self {
        Self { serviceability: account.serviceability(now), days_remaining: account.days_remaining(now), account }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Activate immediately for this many days; pending otherwise.
    #[serde(default)]
    pub activate_days: Option<i64>,
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

// =============================================================================
// VALIDATION
// =============================================================================

fn check_days(days: i64) -> Result<i32, AccountError> {
    if !(1..=MAX_ACTIVATION_DAYS).contains(&days) {
        return Err(AccountError::InvalidDays);
    }
    i32::try_from(days).map_err(|_| AccountError::InvalidDays)
}

fn check_offset(offset: i32) -> Result<i32, AccountError> {
    if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&offset) {
        return Err(AccountError::InvalidOffset);
    }
    Ok(offset)
}

fn check_name(name: &str) -> Result<String, AccountError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AccountError::InvalidName);
    }
    Ok(name.to_owned())
}

// =============================================================================
// CRUD
// =============================================================================

/// Create an account. Pending unless `activate_days` is given.
///
/// # Errors
///
/// Returns validation errors, `EmailTaken`, or a database error.
pub async fn create(pool: &PgPool, new: &NewAccount) -> Result<Account, AccountError> {
    let mut conn = pool.acquire().await?;
    create_in(&mut conn, new).await
}

/// `create` on a caller-owned connection, so the insert can share a
/// transaction with other writes.
///
/// # Errors
///
/// Same as `create`.
pub async fn create_in(conn: &mut PgConnection, new: &NewAccount) -> Result<Account, AccountError> {
    let name = check_name(&new.name)?;
    let email = auth::normalize_email(&new.email).ok_or(AccountError::InvalidEmail)?;
    auth::check_password_policy(&new.password)?;
    let offset = check_offset(new.utc_offset_minutes.unwrap_or(0))?;
    let days = new.activate_days.map(check_days).transpose()?;
    let hash = auth::hash_password(&new.password)?;

    let account = sqlx::query_as::<_, Account>(&format!(
        "INSERT INTO accounts (name, email, password_hash, status, activated_at, expires_at, utc_offset_minutes)
         VALUES ($1, $2, $3,
                 CASE WHEN $4::INT IS NULL THEN 'pending' ELSE 'active' END,
                 CASE WHEN $4::INT IS NULL THEN NULL ELSE now() END,
                 CASE WHEN $4::INT IS NULL THEN NULL ELSE now() + make_interval(days => $4) END,
                 $5)
         RETURNING {ACCOUNT_COLUMNS}"
    ))
    .bind(name)
    .bind(email)
    .bind(hash)
    .bind(days)
    .bind(offset)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(account_id = %account.id, status = account.status.as_str(), "account created");
    Ok(account)
}

/// All accounts, newest first.
pub async fn list(pool: &PgPool) -> Result<Vec<Account>, AccountError> {
    let rows = sqlx::query_as::<_, Account>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY created_at DESC"))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns `NotFound` if no such account exists.
pub async fn get(pool: &PgPool, account_id: Uuid) -> Result<Account, AccountError> {
    sqlx::query_as::<_, Account>(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AccountError::NotFound(account_id))
}

/// Partially update profile fields.
///
/// # Errors
///
/// Returns validation errors, `EmailTaken`, or `NotFound`.
pub async fn update(pool: &PgPool, account_id: Uuid, patch: &AccountPatch) -> Result<Account, AccountError> {
    let name = patch.name.as_deref().map(check_name).transpose()?;
    let email = patch
        .email
        .as_deref()
        .map(|e| auth::normalize_email(e).ok_or(AccountError::InvalidEmail))
        .transpose()?;
    let offset = patch.utc_offset_minutes.map(check_offset).transpose()?;

    sqlx::query_as::<_, Account>(&format!(
        "UPDATE accounts SET
             name = COALESCE($2, name),
             email = COALESCE($3, email),
             utc_offset_minutes = COALESCE($4, utc_offset_minutes)
         WHERE id = $1
         RETURNING {ACCOUNT_COLUMNS}"
    ))
    .bind(account_id)
    .bind(name)
    .bind(email)
    .bind(offset)
    .fetch_optional(pool)
    .await?
    .ok_or(AccountError::NotFound(account_id))
}

/// Delete an account and, by cascade, all of its content.
///
/// # Errors
///
/// Returns `NotFound` if no row was deleted.
pub async fn delete(pool: &PgPool, account_id: Uuid) -> Result<(), AccountError> {
    let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
        .bind(account_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AccountError::NotFound(account_id));
    }
    sqlx::query("DELETE FROM sessions WHERE principal_id = $1 AND role = 'owner'")
        .bind(account_id)
        .execute(pool)
        .await?;
    tracing::info!(%account_id, "account deleted");
    Ok(())
}

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Mark active with a fresh window of `days` starting now.
///
/// # Errors
///
/// Returns `InvalidDays` or `NotFound`.
pub async fn activate(pool: &PgPool, account_id: Uuid, days: i64) -> Result<Account, AccountError> {
    let days = check_days(days)?;
    let account = sqlx::query_as::<_, Account>(&format!(
        "UPDATE accounts SET
             status = 'active',
             activated_at = now(),
             expires_at = now() + make_interval(days => $2)
         WHERE id = $1
         RETURNING {ACCOUNT_COLUMNS}"
    ))
    .bind(account_id)
    .bind(days)
    .fetch_optional(pool)
    .await?
    .ok_or(AccountError::NotFound(account_id))?;
    tracing::info!(%account_id, days, "account activated");
    Ok(account)
}

/// Push the end of the activation window out by `days`.
///
/// # Errors
///
/// Returns `InvalidDays` or `NotFound`.
pub async fn extend(pool: &PgPool, account_id: Uuid, days: i64) -> Result<Account, AccountError> {
    let days = check_days(days)?;
    let account = sqlx::query_as::<_, Account>(&format!(
        "UPDATE accounts SET
             expires_at = GREATEST(COALESCE(expires_at, now()), now()) + make_interval(days => $2)
         WHERE id = $1
         RETURNING {ACCOUNT_COLUMNS}"
    ))
    .bind(account_id)
    .bind(days)
    .fetch_optional(pool)
    .await?
    .ok_or(AccountError::NotFound(account_id))?;
    tracing::info!(%account_id, days, "account extended");
    Ok(account)
}

/// # Errors
///
/// Returns `NotFound` if no such account exists.
pub async fn suspend(pool: &PgPool, account_id: Uuid) -> Result<Account, AccountError> {
    let account = sqlx::query_as::<_, Account>(&format!(
        "UPDATE accounts SET status = 'suspended' WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
    ))
    .bind(account_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AccountError::NotFound(account_id))?;
    tracing::info!(%account_id, "account suspended");
    Ok(account)
}

/// Suspend every active account whose window has closed. Returns the rows changed.
pub async fn suspend_expired(pool: &PgPool) -> Result<Vec<Account>, AccountError> {
    let rows = sqlx::query_as::<_, Account>(&format!(
        "UPDATE accounts SET status = 'suspended'
         WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= now()
         RETURNING {ACCOUNT_COLUMNS}"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Serviceability and wall-clock offset for a kiosk. `None` if unknown.
pub async fn serviceability(
    pool: &PgPool,
    account_id: Uuid,
    now: OffsetDateTime,
) -> Result<Option<(Serviceability, i32)>, AccountError> {
    match get(pool, account_id).await {
        Ok(account) => Ok(Some((account.serviceability(now), account.utc_offset_minutes))),
        Err(AccountError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Reject owner mutations while the account is suspended.
///
/// # Errors
///
/// Returns `Suspended` or `NotFound`.
pub async fn ensure_writable(pool: &PgPool, account_id: Uuid) -> Result<(), AccountError> {
    let status: Option<String> = sqlx::query_scalar("SELECT status FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_optional(pool)
        .await?;
    match status.as_deref().and_then(AccountStatus::parse) {
        None => Err(AccountError::NotFound(account_id)),
        Some(AccountStatus::Suspended) => Err(AccountError::Suspended),
        Some(_) => Ok(()),
    }
}

/// Tell an account's kiosks and dashboards that its lifecycle changed.
pub async fn publish_update(state: &AppState, account: &Account) {
    let view = AccountView::new(account.clone(), OffsetDateTime::now_utc());
    let row = serde_json::to_value(&view).unwrap_or_default();
    feed::publish_change(state, account.id, "account", FeedOp::Update, row).await;
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
