//! Public subscription-request form endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

use crate::rate_limit::LimitScope;
use crate::routes::ApiError;
use crate::routes::admin::subscription_error;
use crate::routes::auth::rate_limit_error;
use crate::services::auth::normalize_email;
use crate::services::subscription::{self, SubmitRequest, SubscriptionRequest};
use crate::state::AppState;

/// `POST /api/subscription-requests`: unauthenticated; rate limited per email.
pub async fn submit(
    State(state): State<AppState>,
    Json(body): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubscriptionRequest>), ApiError> {
    let key = normalize_email(&body.email).unwrap_or_else(|| body.email.trim().to_ascii_lowercase());
    state
        .rate_limiter
        .check_and_record(LimitScope::Signup, &key)
        .map_err(rate_limit_error)?;
    let row = subscription::submit(&state, &body).await.map_err(subscription_error)?;
    Ok((StatusCode::CREATED, Json(row)))
}
