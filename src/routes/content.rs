//! Content routes: one set of handlers for every content table.
//!
//! The `{kind}` path segment selects the table (`websites`, `slideshows`,
//! `videos`, `notifications`, `news-tickers`, `break-timers`); unknown kinds
//! are a 404 before any query runs.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::model::content::ContentKind;
use crate::routes::ApiError;
use crate::routes::auth::Owner;
use crate::services::content::{self, ContentError, ListFilter};
use crate::state::AppState;

pub(crate) fn content_error(err: ContentError) -> ApiError {
    let status = match err {
        ContentError::NotFound { .. } => StatusCode::NOT_FOUND,
        ContentError::Field(_) | ContentError::ForeignBranch(_) | ContentError::InvalidReorder => {
            StatusCode::BAD_REQUEST
        }
        ContentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::new(status, &err)
}

pub(crate) fn parse_kind(slug: &str) -> Result<ContentKind, ApiError> {
    ContentKind::from_slug(slug)
        .ok_or_else(|| ApiError::plain(StatusCode::NOT_FOUND, "E_UNKNOWN_KIND", format!("unknown content kind: {slug}")))
}

/// `GET /api/content/{kind}?active_only=true&branch={id}`
pub async fn list(
    State(state): State<AppState>,
    owner: Owner,
    Path(kind): Path<String>,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let rows = content::list(&state.pool, kind, owner.account_id, filter)
        .await
        .map_err(content_error)?;
    Ok(Json(rows))
}

pub async fn get(
    State(state): State<AppState>,
    owner: Owner,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    let row = content::get(&state.pool, kind, owner.account_id, id)
        .await
        .map_err(content_error)?;
    Ok(Json(row))
}

pub async fn create(
    State(state): State<AppState>,
    owner: Owner,
    Path(kind): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let kind = parse_kind(&kind)?;
    owner.ensure_writable(&state).await?;
    let row = content::create(&state, kind, owner.account_id, &body)
        .await
        .map_err(content_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `PATCH /api/content/{kind}/{id}`: partial update; absent keys are untouched.
pub async fn update(
    State(state): State<AppState>,
    owner: Owner,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    owner.ensure_writable(&state).await?;
    let row = content::update(&state, kind, owner.account_id, id, &body)
        .await
        .map_err(content_error)?;
    Ok(Json(row))
}

pub async fn delete(
    State(state): State<AppState>,
    owner: Owner,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&kind)?;
    owner.ensure_writable(&state).await?;
    content::delete(&state, kind, owner.account_id, id)
        .await
        .map_err(content_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ActiveBody {
    pub active: bool,
}

/// `PUT /api/content/{kind}/{id}/active`: for slideshows and videos,
/// activating one deactivates its siblings.
pub async fn set_active(
    State(state): State<AppState>,
    owner: Owner,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(body): Json<ActiveBody>,
) -> Result<Json<Value>, ApiError> {
    let kind = parse_kind(&kind)?;
    owner.ensure_writable(&state).await?;
    let row = content::set_active(&state, kind, owner.account_id, id, body.active)
        .await
        .map_err(content_error)?;
    Ok(Json(row))
}

#[derive(Deserialize)]
pub struct ReorderBody {
    pub ids: Vec<Uuid>,
}

/// `PUT /api/content/{kind}/reorder`: `ids[i]` gets `display_order = i`.
pub async fn reorder(
    State(state): State<AppState>,
    owner: Owner,
    Path(kind): Path<String>,
    Json(body): Json<ReorderBody>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let kind = parse_kind(&kind)?;
    owner.ensure_writable(&state).await?;
    let rows = content::reorder(&state, kind, owner.account_id, &body.ids)
        .await
        .map_err(content_error)?;
    Ok(Json(rows))
}
