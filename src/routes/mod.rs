//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API, the two websocket endpoints (kiosk display
//! sessions and the owner change feed), and the public media directory under
//! a single Axum router.
//!
//! Every handler returns `Result<_, ApiError>`; service errors convert into
//! an HTTP status plus a JSON body carrying the grepable `ErrorCode`.

pub mod admin;
pub mod auth;
pub mod branches;
pub mod content;
pub mod display;
pub mod displays;
pub mod feed;
pub mod media;
pub mod slides;
pub mod subscriptions;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post, put};
use serde_json::json;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::frame::ErrorCode;
use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

/// HTTP error response: status plus `{code, message, retryable}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Self {
        if status.is_server_error() {
            tracing::error!(code = err.error_code(), error = %err, "request failed");
        }
        Self { status, code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }

    #[must_use]
    pub fn plain(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into(), retryable: false }
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::plain(StatusCode::FORBIDDEN, "E_FORBIDDEN", "forbidden")
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::plain(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "authentication required")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "code": self.code, "message": self.message, "retryable": self.retryable });
        (self.status, Json(body)).into_response()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

fn api_routes() -> Router<AppState> {
    Router::new()
        // auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/password", post(auth::change_password))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        // super-admin
        .route("/api/admin/accounts", get(admin::list_accounts).post(admin::create_account))
        .route(
            "/api/admin/accounts/{id}",
            get(admin::get_account)
                .patch(admin::update_account)
                .delete(admin::delete_account),
        )
        .route("/api/admin/accounts/{id}/activate", post(admin::activate_account))
        .route("/api/admin/accounts/{id}/extend", post(admin::extend_account))
        .route("/api/admin/accounts/{id}/suspend", post(admin::suspend_account))
        .route("/api/admin/subscription-requests", get(admin::list_requests))
        .route("/api/admin/subscription-requests/{id}/approve", post(admin::approve_request))
        .route("/api/admin/subscription-requests/{id}/reject", post(admin::reject_request))
        // owner content
        .route("/api/branches", get(branches::list).post(branches::create))
        .route(
            "/api/branches/{id}",
            get(branches::get).patch(branches::update).delete(branches::delete),
        )
        .route("/api/content/{kind}", get(content::list).post(content::create))
        .route("/api/content/{kind}/reorder", put(content::reorder))
        .route(
            "/api/content/{kind}/{id}",
            get(content::get).patch(content::update).delete(content::delete),
        )
        .route("/api/content/{kind}/{id}/active", put(content::set_active))
        .route("/api/slideshows/{id}/slides", get(slides::list).post(slides::add))
        .route("/api/slideshows/{id}/slides/reorder", put(slides::reorder))
        .route(
            "/api/slideshows/{id}/slides/{slide_id}",
            delete(slides::remove).patch(slides::update),
        )
        .route("/api/media", post(media::upload))
        .route("/api/displays", get(displays::list))
        .route("/api/websites/probe", post(displays::probe))
        .route("/api/feed", get(feed::handle_feed_ws))
        // public
        .route("/api/subscription-requests", post(subscriptions::submit))
        .route("/api/display/{account_id}", get(display::snapshot))
        .route("/api/display/{account_id}/ws", get(display::handle_display_ws))
        .route("/healthz", get(healthz))
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = api_routes();
    // Only a local path prefix can be mounted; an absolute base URL means a CDN serves the files.
    let base = state.media.base_url();
    if let Some(dir) = state.media.serve_dir().filter(|_| base.starts_with('/') && base.len() > 1) {
        router = router.nest_service(base, ServeDir::new(dir));
    }

    let body_limit = state.config.media_max_bytes.saturating_add(64 * 1024);
    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
