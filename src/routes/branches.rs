//! Branch routes: an owner's physical locations.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::json;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::routes::auth::Owner;
use crate::services::branch::{self, Branch, BranchError, BranchInput};
use crate::services::feed::{self, FeedOp};
use crate::state::AppState;

pub(crate) fn branch_error(err: BranchError) -> ApiError {
    let status = match err {
        BranchError::NotFound(_) => StatusCode::NOT_FOUND,
        BranchError::InvalidName => StatusCode::BAD_REQUEST,
        BranchError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::new(status, &err)
}

async fn publish(state: &AppState, op: FeedOp, row: &Branch) {
    let value = serde_json::to_value(row).unwrap_or_default();
    feed::publish_change(state, row.account_id, "branch", op, value).await;
}

pub async fn list(State(state): State<AppState>, owner: Owner) -> Result<Json<Vec<Branch>>, ApiError> {
    let rows = branch::list(&state.pool, owner.account_id).await.map_err(branch_error)?;
    Ok(Json(rows))
}

pub async fn get(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<Branch>, ApiError> {
    let row = branch::get(&state.pool, owner.account_id, id).await.map_err(branch_error)?;
    Ok(Json(row))
}

pub async fn create(
    State(state): State<AppState>,
    owner: Owner,
    Json(input): Json<BranchInput>,
) -> Result<(StatusCode, Json<Branch>), ApiError> {
    owner.ensure_writable(&state).await?;
    let row = branch::create(&state.pool, owner.account_id, &input).await.map_err(branch_error)?;
    publish(&state, FeedOp::Insert, &row).await;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<Uuid>,
    Json(input): Json<BranchInput>,
) -> Result<Json<Branch>, ApiError> {
    owner.ensure_writable(&state).await?;
    let row = branch::update(&state.pool, owner.account_id, id, &input).await.map_err(branch_error)?;
    publish(&state, FeedOp::Update, &row).await;
    Ok(Json(row))
}

/// Content scoped to the branch falls back to account-wide (`branch_id` set null).
pub async fn delete(
    State(state): State<AppState>,
    owner: Owner,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    owner.ensure_writable(&state).await?;
    branch::delete(&state.pool, owner.account_id, id).await.map_err(branch_error)?;
    let row = json!({ "id": id, "account_id": owner.account_id });
    feed::publish_change(&state, owner.account_id, "branch", FeedOp::Delete, row).await;
    Ok(StatusCode::NO_CONTENT)
}
