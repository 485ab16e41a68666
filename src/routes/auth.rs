//! Auth routes: password login, session cookie, WS tickets.

use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::rate_limit::{LimitScope, RateLimitError};
use crate::routes::ApiError;
use crate::services::account::{self, AccountView};
use crate::services::auth::{self as auth_svc, AuthError};
use crate::services::session::{self, Role, SessionPrincipal};
use crate::state::AppState;

const COOKIE_NAME: &str = "session_token";

fn session_cookie(value: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

pub(crate) fn auth_error(err: AuthError) -> ApiError {
    let status = match err {
        AuthError::InvalidEmail | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::Hash(_) | AuthError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::new(status, &err)
}

pub(crate) fn rate_limit_error(err: RateLimitError) -> ApiError {
    ApiError::new(StatusCode::TOO_MANY_REQUESTS, &err)
}

pub(crate) fn db_error(err: sqlx::Error) -> ApiError {
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, &AuthError::Db(err))
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated principal extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub principal: SessionPrincipal,
    pub token: String,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::unauthorized());
        }

        let app_state = AppState::from_ref(state);
        let principal = session::validate_session(&app_state.pool, token)
            .await
            .map_err(db_error)?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self { principal, token: token.to_owned() })
    }
}

/// An authenticated account owner; `account_id` scopes every query.
pub struct Owner {
    pub account_id: Uuid,
    pub auth: AuthUser,
}

impl<S> axum::extract::FromRequestParts<S> for Owner
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if auth.principal.role != Role::Owner {
            return Err(ApiError::forbidden());
        }
        Ok(Self { account_id: auth.principal.id, auth })
    }
}

/// The super-admin.
pub struct Admin(pub AuthUser);

impl<S> axum::extract::FromRequestParts<S> for Admin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if auth.principal.role != Role::Admin {
            return Err(ApiError::forbidden());
        }
        Ok(Self(auth))
    }
}

impl Owner {
    /// Reject the mutation if this owner's account is suspended.
    pub async fn ensure_writable(&self, state: &AppState) -> Result<(), ApiError> {
        account::ensure_writable(&state.pool, self.account_id)
            .await
            .map_err(crate::routes::admin::account_error)
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/login`: verify credentials, set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError> {
    let key = auth_svc::normalize_email(&body.email).unwrap_or_else(|| body.email.trim().to_ascii_lowercase());
    state
        .rate_limiter
        .check_and_record(LimitScope::Login, &key)
        .map_err(rate_limit_error)?;

    let (principal_id, role) = auth_svc::login(&state.pool, &body.email, &body.password)
        .await
        .map_err(|e| {
            if matches!(e, AuthError::InvalidCredentials) {
                tracing::info!(email = %key, "login rejected");
            }
            auth_error(e)
        })?;
    state.rate_limiter.reset(LimitScope::Login, &key);

    let ttl_hours = state.config.session_ttl_hours;
    let token = session::create_session(&state.pool, principal_id, role, ttl_hours)
        .await
        .map_err(db_error)?;
    let principal = session::validate_session(&state.pool, &token)
        .await
        .map_err(db_error)?
        .ok_or_else(ApiError::unauthorized)?;
    tracing::info!(%principal_id, role = role.as_str(), "login succeeded");

    let body = me_body(&state, &principal).await?;
    let cookie = session_cookie(token, state.config.cookie_secure, Duration::hours(ttl_hours));
    Ok((jar.add(cookie), Json(body)))
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, "session delete failed on logout");
    }
    let cookie = session_cookie(String::new(), state.config.cookie_secure, Duration::ZERO);
    (CookieJar::new().add(cookie), StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`: current principal; owners also get their account status.
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>, ApiError> {
    Ok(Json(me_body(&state, &auth.principal).await?))
}

async fn me_body(state: &AppState, principal: &SessionPrincipal) -> Result<Value, ApiError> {
    let account = match principal.role {
        Role::Owner => {
            let acct = account::get(&state.pool, principal.id)
                .await
                .map_err(crate::routes::admin::account_error)?;
            Some(AccountView::new(acct, OffsetDateTime::now_utc()))
        }
        Role::Admin => None,
    };
    Ok(json!({ "principal": principal, "account": account }))
}

#[derive(Deserialize)]
pub struct ChangePasswordBody {
    pub current_password: String,
    pub new_password: String,
}

/// `POST /api/auth/password`: change password and sign out other sessions.
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChangePasswordBody>,
) -> Result<StatusCode, ApiError> {
    let principal = &auth.principal;
    auth_svc::change_password(
        &state.pool,
        principal.id,
        principal.role,
        &body.current_password,
        &body.new_password,
    )
    .await
    .map_err(auth_error)?;
    let revoked = session::delete_other_sessions(&state.pool, principal.id, &auth.token)
        .await
        .map_err(db_error)?;
    tracing::info!(principal_id = %principal.id, revoked, "other sessions revoked after password change");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/auth/ws-ticket`: create a one-time ticket for the owner feed socket.
pub async fn ws_ticket(State(state): State<AppState>, owner: Owner) -> Result<Json<Value>, ApiError> {
    let ticket = session::create_ws_ticket(&state.pool, owner.account_id)
        .await
        .map_err(db_error)?;
    Ok(Json(json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
