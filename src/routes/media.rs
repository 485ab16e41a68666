//! Media upload.
//!
//! The request body is the raw file; the original file name travels in the
//! `name` query parameter and only its extension is used.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use crate::routes::ApiError;
use crate::routes::auth::Owner;
use crate::services::media::{MediaError, StoredMedia};
use crate::state::AppState;

pub(crate) fn media_error(err: MediaError) -> ApiError {
    let status = match err {
        MediaError::Empty | MediaError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
        MediaError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        MediaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::new(status, &err)
}

#[derive(Deserialize)]
pub struct UploadQuery {
    pub name: String,
}

/// `POST /api/media?name=promo.mp4`
pub async fn upload(
    State(state): State<AppState>,
    owner: Owner,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<StoredMedia>), ApiError> {
    owner.ensure_writable(&state).await?;
    let stored = state.media.put(&query.name, &body).await.map_err(media_error)?;
    tracing::info!(account_id = %owner.account_id, name = %stored.name, size = stored.size, "media uploaded");
    Ok((StatusCode::CREATED, Json(stored)))
}
