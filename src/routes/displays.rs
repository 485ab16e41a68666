//! Owner-facing display tooling: connected kiosks and the website probe.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::ORIGIN};
use axum::response::Json;
use serde::Deserialize;

use crate::routes::ApiError;
use crate::routes::auth::Owner;
use crate::services::feed::{self, ConnectedDisplay};
use crate::services::probe::{self, ProbeError, ProbeReport};
use crate::state::AppState;

/// `GET /api/displays`: kiosks currently holding a display socket.
pub async fn list(State(state): State<AppState>, owner: Owner) -> Json<Vec<ConnectedDisplay>> {
    Json(feed::list_displays(&state, owner.account_id).await)
}

#[derive(Deserialize)]
pub struct ProbeBody {
    pub url: String,
}

/// `POST /api/websites/probe`: would this URL render inside a kiosk iframe?
///
/// The dashboard and kiosks share an origin, so the request's `Origin`
/// header stands in for the kiosk's.
pub async fn probe(
    _owner: Owner,
    headers: HeaderMap,
    Json(body): Json<ProbeBody>,
) -> Result<Json<ProbeReport>, ApiError> {
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    let report = probe::probe(&body.url, origin)
        .await
        .map_err(|e: ProbeError| ApiError::new(StatusCode::BAD_REQUEST, &e))?;
    Ok(Json(report))
}
