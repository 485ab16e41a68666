//! Subscription requests: public lead capture reviewed by the super-admin.
//!
//! SYSTEM CONTEXT
//! ==============
//! The public pricing page posts a request; the admin is emailed. Approving
//! a request provisions an active account with a generated temporary
//! password and emails the prospect their credentials. Rejection only
//! records the decision.

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::frame::ErrorCode;
use crate::model::account::Account;
use crate::services::account::{self, AccountError, NewAccount};
use crate::services::auth;
use crate::services::email::{self, SubscriptionRequestNotice};
use crate::state::AppState;

const MAX_FIELD_LEN: usize = 200;
const MAX_MESSAGE_LEN: usize = 4_000;
const REQUEST_COLUMNS: &str = "id, company, contact_name, email, phone, plan, message, status, account_id, created_at";

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("invalid `{0}`")]
    Invalid(&'static str),
    #[error("subscription request not found: {0}")]
    NotFound(Uuid),
    #[error("subscription request already {0}")]
    AlreadyDecided(String),
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for SubscriptionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "E_INVALID_REQUEST",
            Self::NotFound(_) => "E_REQUEST_NOT_FOUND",
            Self::AlreadyDecided(_) => "E_REQUEST_DECIDED",
            Self::Account(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    pub company: String,
    pub contact_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubscriptionRequest {
    pub id: Uuid,
    pub company: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub plan: Option<String>,
    pub message: Option<String>,
    pub status: String,
    pub account_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Validated and trimmed form of `SubmitRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CleanRequest {
    company: String,
    contact_name: String,
    email: String,
    phone: Option<String>,
    plan: Option<String>,
    message: Option<String>,
}

fn required(raw: &str, field: &'static str) -> Result<String, SubscriptionError> {
    let value = raw.trim();
    if value.is_empty() || value.chars().count() > MAX_FIELD_LEN {
        return Err(SubscriptionError::Invalid(field));
    }
    Ok(value.to_owned())
}

fn optional(raw: Option<&str>, field: &'static str, max: usize) -> Result<Option<String>, SubscriptionError> {
    let Some(value) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(SubscriptionError::Invalid(field));
    }
    Ok(Some(value.to_owned()))
}

fn clean(request: &SubmitRequest) -> Result<CleanRequest, SubscriptionError> {
    Ok(CleanRequest {
        company: required(&request.company, "company")?,
        contact_name: required(&request.contact_name, "contact_name")?,
        email: auth::normalize_email(&request.email).ok_or(SubscriptionError::Invalid("email"))?,
        phone: optional(request.phone.as_deref(), "phone", MAX_FIELD_LEN)?,
        plan: optional(request.plan.as_deref(), "plan", MAX_FIELD_LEN)?,
        message: optional(request.message.as_deref(), "message", MAX_MESSAGE_LEN)?,
    })
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Record a public request and notify the admin mailbox.
///
/// # Errors
///
/// Returns `Invalid` for malformed fields or a database error.
pub async fn submit(state: &AppState, request: &SubmitRequest) -> Result<SubscriptionRequest, SubscriptionError> {
    let clean = clean(request)?;
    let row = sqlx::query_as::<_, SubscriptionRequest>(&format!(
        "INSERT INTO subscription_requests (company, contact_name, email, phone, plan, message)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(&clean.company)
    .bind(&clean.contact_name)
    .bind(&clean.email)
    .bind(&clean.phone)
    .bind(&clean.plan)
    .bind(&clean.message)
    .fetch_one(&state.pool)
    .await?;
    tracing::info!(request_id = %row.id, company = %row.company, "subscription request received");

    if let Some(admin) = &state.config.admin_notify_email {
        let notice = SubscriptionRequestNotice {
            company: &clean.company,
            contact_name: &clean.contact_name,
            email: &clean.email,
            phone: clean.phone.as_deref(),
            plan: clean.plan.as_deref(),
            message: clean.message.as_deref(),
        };
        email::deliver(state.mailer.as_ref(), email::subscription_request_email(admin, &notice)).await;
    }
    Ok(row)
}

/// Requests, newest first, optionally filtered by status.
pub async fn list(pool: &PgPool, status: Option<&str>) -> Result<Vec<SubscriptionRequest>, SubscriptionError> {
    let rows = sqlx::query_as::<_, SubscriptionRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM subscription_requests
         WHERE $1::TEXT IS NULL OR status = $1
         ORDER BY created_at DESC"
    ))
    .bind(status)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Provision an active account for a `new` request and email the credentials.
///
/// The account insert and the decision commit together; the email goes out
/// only after the commit.
///
/// # Errors
///
/// Returns `NotFound`, `AlreadyDecided`, or the account creation error
/// (e.g. `EmailTaken`).
pub async fn approve(
    state: &AppState,
    request_id: Uuid,
    days: i64,
) -> Result<(SubscriptionRequest, Account), SubscriptionError> {
    let mut tx = state.pool.begin().await?;
    let request = pending(&mut tx, request_id).await?;
    let password = auth::generate_temporary_password();
    let account = account::create_in(
        &mut tx,
        &NewAccount {
            name: request.company.clone(),
            email: request.email.clone(),
            password: password.clone(),
            activate_days: Some(days),
            utc_offset_minutes: None,
        },
    )
    .await?;

    let decided = decide(&mut tx, request_id, "approved", Some(account.id)).await?;
    tx.commit().await?;
    tracing::info!(%request_id, account_id = %account.id, days, "subscription request approved");

    let message = email::account_activated_email(&account.email, &account.name, Some(&password), account.expires_at);
    email::deliver(state.mailer.as_ref(), message).await;
    Ok((decided, account))
}

/// # Errors
///
/// Returns `NotFound` or `AlreadyDecided`.
pub async fn reject(pool: &PgPool, request_id: Uuid) -> Result<SubscriptionRequest, SubscriptionError> {
    let mut tx = pool.begin().await?;
    pending(&mut tx, request_id).await?;
    let decided = decide(&mut tx, request_id, "rejected", None).await?;
    tx.commit().await?;
    tracing::info!(%request_id, "subscription request rejected");
    Ok(decided)
}

/// Lock a request and require it to still be `new`.
async fn pending(conn: &mut PgConnection, request_id: Uuid) -> Result<SubscriptionRequest, SubscriptionError> {
    let request = sqlx::query_as::<_, SubscriptionRequest>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM subscription_requests WHERE id = $1 FOR UPDATE"
    ))
    .bind(request_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(SubscriptionError::NotFound(request_id))?;
    if request.status != "new" {
        return Err(SubscriptionError::AlreadyDecided(request.status));
    }
    Ok(request)
}

async fn decide(
    conn: &mut PgConnection,
    request_id: Uuid,
    status: &str,
    account_id: Option<Uuid>,
) -> Result<SubscriptionRequest, SubscriptionError> {
    sqlx::query_as::<_, SubscriptionRequest>(&format!(
        "UPDATE subscription_requests SET status = $2, account_id = $3
         WHERE id = $1 AND status = 'new'
         RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(request_id)
    .bind(status)
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| SubscriptionError::AlreadyDecided(status.to_owned()))
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;
