//! Super-admin routes: tenant accounts and subscription requests.
//!
//! Lifecycle changes publish `account:update` on the tenant's feed so
//! connected kiosks reload into (or out of) the suspended view without a
//! restart. Emails go out after the change commits.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::routes::auth::{Admin, auth_error};
use crate::services::account::{self, AccountError, AccountPatch, AccountView, NewAccount};
use crate::services::email::{self, SuspensionReason};
use crate::services::feed::{self, FeedOp};
use crate::services::subscription::{self, SubscriptionError, SubscriptionRequest};
use crate::state::AppState;

/// Window granted when a subscription request is approved without an explicit one.
const DEFAULT_APPROVAL_DAYS: i64 = 30;

pub(crate) fn account_error(err: AccountError) -> ApiError {
    let status = match err {
        AccountError::Auth(inner) => return auth_error(inner),
        AccountError::NotFound(_) => StatusCode::NOT_FOUND,
        AccountError::EmailTaken => StatusCode::CONFLICT,
        AccountError::InvalidEmail
        | AccountError::InvalidName
        | AccountError::InvalidDays
        | AccountError::InvalidOffset => StatusCode::BAD_REQUEST,
        AccountError::Suspended => StatusCode::FORBIDDEN,
        AccountError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::new(status, &err)
}

pub(crate) fn subscription_error(err: SubscriptionError) -> ApiError {
    let status = match err {
        SubscriptionError::Account(inner) => return account_error(inner),
        SubscriptionError::Invalid(_) => StatusCode::BAD_REQUEST,
        SubscriptionError::NotFound(_) => StatusCode::NOT_FOUND,
        SubscriptionError::AlreadyDecided(_) => StatusCode::CONFLICT,
        SubscriptionError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::new(status, &err)
}

fn view(account: crate::model::account::Account) -> AccountView {
    AccountView::new(account, OffsetDateTime::now_utc())
}

// =============================================================================
// ACCOUNTS
// =============================================================================

/// `GET /api/admin/accounts`: every tenant with computed serviceability.
pub async fn list_accounts(State(state): State<AppState>, _admin: Admin) -> Result<Json<Vec<AccountView>>, ApiError> {
    let now = OffsetDateTime::now_utc();
    let rows = account::list(&state.pool).await.map_err(account_error)?;
    Ok(Json(rows.into_iter().map(|a| AccountView::new(a, now)).collect()))
}

/// `POST /api/admin/accounts`
pub async fn create_account(
    State(state): State<AppState>,
    _admin: Admin,
    Json(body): Json<NewAccount>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let created = account::create(&state.pool, &body).await.map_err(account_error)?;
    Ok((StatusCode::CREATED, Json(view(created))))
}

pub async fn get_account(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountView>, ApiError> {
    let acct = account::get(&state.pool, id).await.map_err(account_error)?;
    Ok(Json(view(acct)))
}

/// `PATCH /api/admin/accounts/{id}`: rename, change login email, or set the kiosk UTC offset.
pub async fn update_account(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
    Json(patch): Json<AccountPatch>,
) -> Result<Json<AccountView>, ApiError> {
    let acct = account::update(&state.pool, id, &patch).await.map_err(account_error)?;
    account::publish_update(&state, &acct).await;
    Ok(Json(view(acct)))
}

/// `DELETE /api/admin/accounts/{id}`: cascades to all content.
pub async fn delete_account(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    account::delete(&state.pool, id).await.map_err(account_error)?;
    feed::publish_change(&state, id, "account", FeedOp::Delete, json!({ "id": id })).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct DaysBody {
    pub days: i64,
}

/// `POST /api/admin/accounts/{id}/activate`: open a fresh window of `days` from now.
pub async fn activate_account(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
    Json(body): Json<DaysBody>,
) -> Result<Json<AccountView>, ApiError> {
    let acct = account::activate(&state.pool, id, body.days).await.map_err(account_error)?;
    account::publish_update(&state, &acct).await;
    let notice = email::account_activated_email(&acct.email, &acct.name, None, acct.expires_at);
    email::deliver(state.mailer.as_ref(), notice).await;
    Ok(Json(view(acct)))
}

/// `POST /api/admin/accounts/{id}/extend`: push the window end out by `days`.
pub async fn extend_account(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
    Json(body): Json<DaysBody>,
) -> Result<Json<AccountView>, ApiError> {
    let acct = account::extend(&state.pool, id, body.days).await.map_err(account_error)?;
    account::publish_update(&state, &acct).await;
    Ok(Json(view(acct)))
}

/// `POST /api/admin/accounts/{id}/suspend`
pub async fn suspend_account(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountView>, ApiError> {
    let acct = account::suspend(&state.pool, id).await.map_err(account_error)?;
    account::publish_update(&state, &acct).await;
    let notice =
        email::account_suspended_email(&acct.email, &acct.name, SuspensionReason::Manual, OffsetDateTime::now_utc());
    email::deliver(state.mailer.as_ref(), notice).await;
    Ok(Json(view(acct)))
}

// =============================================================================
// SUBSCRIPTION REQUESTS
// =============================================================================

#[derive(Deserialize)]
pub struct RequestFilter {
    pub status: Option<String>,
}

/// `GET /api/admin/subscription-requests?status=new`
pub async fn list_requests(
    State(state): State<AppState>,
    _admin: Admin,
    Query(filter): Query<RequestFilter>,
) -> Result<Json<Vec<SubscriptionRequest>>, ApiError> {
    let rows = subscription::list(&state.pool, filter.status.as_deref())
        .await
        .map_err(subscription_error)?;
    Ok(Json(rows))
}

#[derive(Deserialize, Default)]
pub struct ApproveBody {
    pub days: Option<i64>,
}

/// An empty body approves with the default window.
fn parse_approve_body(raw: &[u8]) -> Result<ApproveBody, ApiError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(ApproveBody::default());
    }
    serde_json::from_slice(raw)
        .map_err(|e| ApiError::plain(StatusCode::BAD_REQUEST, "E_INVALID_BODY", e.to_string()))
}

/// `POST /api/admin/subscription-requests/{id}/approve`
pub async fn approve_request(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let days = parse_approve_body(&body)?.days.unwrap_or(DEFAULT_APPROVAL_DAYS);
    let (request, acct) = subscription::approve(&state, id, days).await.map_err(subscription_error)?;
    Ok(Json(json!({ "request": request, "account": view(acct) })))
}

/// `POST /api/admin/subscription-requests/{id}/reject`
pub async fn reject_request(
    State(state): State<AppState>,
    _admin: Admin,
    Path(id): Path<Uuid>,
) -> Result<Json<SubscriptionRequest>, ApiError> {
    let request = subscription::reject(&state.pool, id).await.map_err(subscription_error)?;
    Ok(Json(request))
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
