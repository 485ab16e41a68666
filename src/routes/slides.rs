//! Slide routes, nested under their slideshow.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use crate::model::content::Slide;
use crate::routes::ApiError;
use crate::routes::auth::Owner;
use crate::routes::content::ReorderBody;
use crate::services::slides::{self, SlideError, SlideInput};
use crate::state::AppState;

pub(crate) fn slide_error(err: SlideError) -> ApiError {
    let status = match err {
        SlideError::SlideshowNotFound(_) | SlideError::NotFound(_) => StatusCode::NOT_FOUND,
        SlideError::Invalid { .. } | SlideError::InvalidReorder => StatusCode::BAD_REQUEST,
        SlideError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::new(status, &err)
}

pub async fn list(
    State(state): State<AppState>,
    owner: Owner,
    Path(slideshow_id): Path<Uuid>,
) -> Result<Json<Vec<Slide>>, ApiError> {
    let rows = slides::list(&state.pool, owner.account_id, slideshow_id)
        .await
        .map_err(slide_error)?;
    Ok(Json(rows))
}

pub async fn add(
    State(state): State<AppState>,
    owner: Owner,
    Path(slideshow_id): Path<Uuid>,
    Json(input): Json<SlideInput>,
) -> Result<(StatusCode, Json<Slide>), ApiError> {
    owner.ensure_writable(&state).await?;
    let slide = slides::add(&state, owner.account_id, slideshow_id, &input)
        .await
        .map_err(slide_error)?;
    Ok((StatusCode::CREATED, Json(slide)))
}

pub async fn update(
    State(state): State<AppState>,
    owner: Owner,
    Path((slideshow_id, slide_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<SlideInput>,
) -> Result<Json<Slide>, ApiError> {
    owner.ensure_writable(&state).await?;
    let slide = slides::update(&state, owner.account_id, slideshow_id, slide_id, &input)
        .await
        .map_err(slide_error)?;
    Ok(Json(slide))
}

pub async fn remove(
    State(state): State<AppState>,
    owner: Owner,
    Path((slideshow_id, slide_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    owner.ensure_writable(&state).await?;
    slides::remove(&state, owner.account_id, slideshow_id, slide_id)
        .await
        .map_err(slide_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reorder(
    State(state): State<AppState>,
    owner: Owner,
    Path(slideshow_id): Path<Uuid>,
    Json(body): Json<ReorderBody>,
) -> Result<Json<Vec<Slide>>, ApiError> {
    owner.ensure_writable(&state).await?;
    let rows = slides::reorder(&state, owner.account_id, slideshow_id, &body.ids)
        .await
        .map_err(slide_error)?;
    Ok(Json(rows))
}
