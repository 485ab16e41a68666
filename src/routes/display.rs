//! Kiosk display endpoints: public snapshot and the display websocket.
//!
//! DESIGN
//! ======
//! A kiosk opens `/api/display/{account_id}/ws` and never sends anything but
//! heartbeats. The session owns one `DisplayEngine` and runs a `select!` loop
//! over three sources:
//! - socket receive (heartbeats, close)
//! - the account's change feed (marks the reload debounce)
//! - a sleep until the engine's next rotation deadline or the debounce
//!   deadline, whichever is sooner
//!
//! Reloads retry a bounded number of times; on final failure the kiosk keeps
//! showing what it had.
//!
//! LIFECYCLE
//! =========
//! 1. Load snapshot (404 for unknown accounts) → upgrade
//! 2. Subscribe to the feed → send `display:connected` → initial updates
//! 3. Loop: heartbeats, debounced reloads, rotation ticks
//! 4. Close → unsubscribe

use std::time::Instant;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::display::{Debounce, DisplayEngine, DisplaySnapshot, DisplayUpdate};
use crate::frame::{Frame, ProtocolError};
use crate::model::account::Serviceability;
use crate::routes::ApiError;
use crate::services::display::{self as snapshot_svc, SnapshotError};
use crate::services::feed::{self, FEED_CHANNEL_CAPACITY};
use crate::state::{AppState, SubscriberRole};

/// Feed prefixes whose events can change what a kiosk shows.
const RELOAD_PREFIXES: &[&str] = &[
    "account",
    "branch",
    "website",
    "slideshow",
    "slide",
    "video",
    "notification",
    "news_ticker",
    "break_timer",
];

const MAX_LABEL_LEN: usize = 80;

#[derive(Debug, Default, Deserialize)]
pub struct DisplayQuery {
    pub branch: Option<Uuid>,
    /// Kiosk wall-clock offset; overrides the account default.
    pub utc_offset: Option<i32>,
    pub label: Option<String>,
}

fn snapshot_error(err: SnapshotError) -> ApiError {
    ApiError::new(StatusCode::SERVICE_UNAVAILABLE, &err)
}

fn unknown_account(account_id: Uuid) -> ApiError {
    ApiError::plain(StatusCode::NOT_FOUND, "E_ACCOUNT_NOT_FOUND", format!("account not found: {account_id}"))
}

/// Offsets outside UTC-12..UTC+14 are ignored.
fn clamp_offset(raw: Option<i32>) -> Option<i32> {
    raw.filter(|m| (-720..=840).contains(m))
}

fn clean_label(raw: Option<String>) -> Option<String> {
    let label = raw?.trim().chars().take(MAX_LABEL_LEN).collect::<String>();
    (!label.is_empty()).then_some(label)
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// `GET /api/display/{account_id}?branch=&utc_offset=`: one-shot view for
/// kiosks that poll instead of holding a socket.
pub async fn snapshot(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<DisplayQuery>,
) -> Result<Json<Value>, ApiError> {
    let wall = OffsetDateTime::now_utc();
    let snapshot = snapshot_svc::load_snapshot(&state.pool, account_id, query.branch, wall)
        .await
        .map_err(snapshot_error)?
        .ok_or_else(|| unknown_account(account_id))?;

    let mut engine = DisplayEngine::new(clamp_offset(query.utc_offset));
    engine.load(snapshot.clone(), Instant::now(), wall);
    Ok(Json(json!({ "snapshot": snapshot, "view": engine.view(wall) })))
}

// =============================================================================
// WEBSOCKET
// =============================================================================

pub async fn handle_display_ws(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<DisplayQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let initial = match snapshot_svc::load_snapshot(&state.pool, account_id, query.branch, OffsetDateTime::now_utc()).await
    {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return unknown_account(account_id).into_response(),
        Err(e) => return snapshot_error(e).into_response(),
    };
    ws.on_upgrade(move |socket| run_display(socket, state, account_id, query, initial))
}

async fn run_display(
    mut socket: WebSocket,
    state: AppState,
    account_id: Uuid,
    query: DisplayQuery,
    initial: DisplaySnapshot,
) {
    let branch_id = query.branch;
    let (tx, mut rx) = mpsc::channel::<Frame>(FEED_CHANNEL_CAPACITY);
    let role = SubscriberRole::Display { branch_id, label: clean_label(query.label) };
    let client_id = feed::subscribe(&state, account_id, role, tx).await;
    info!(%client_id, %account_id, ?branch_id, "display: kiosk connected");

    run_session(&mut socket, &state, account_id, client_id, branch_id, clamp_offset(query.utc_offset), initial, &mut rx)
        .await;

    feed::unsubscribe(&state, account_id, client_id).await;
    info!(%client_id, %account_id, "display: kiosk disconnected");
}

#[allow(clippy::too_many_arguments)]
async fn run_session(
    socket: &mut WebSocket,
    state: &AppState,
    account_id: Uuid,
    client_id: Uuid,
    branch_id: Option<Uuid>,
    utc_offset: Option<i32>,
    initial: DisplaySnapshot,
    rx: &mut mpsc::Receiver<Frame>,
) {
    let connected = Frame::event("display:connected", account_id)
        .with_data("client_id", client_id.to_string())
        .with_data("branch_id", json!(branch_id))
        .with_data("serviceability", json!(initial.serviceability));
    if send_frame(socket, &connected).await.is_err() {
        return;
    }

    let display = state.config.display;
    let mut engine = DisplayEngine::new(utc_offset);
    let mut debounce = Debounce::new(display.debounce, display.debounce_max);

    let updates = engine.load(initial, Instant::now(), OffsetDateTime::now_utc());
    if send_updates(socket, account_id, updates).await.is_err() {
        return;
    }

    loop {
        let now = Instant::now();
        let wake = next_wake(&engine, &debounce, now);

        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let reply = handle_inbound(state, account_id, client_id, text.as_str()).await;
                        if send_frame(socket, &reply).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if triggers_reload(&frame) {
                    debounce.mark(Instant::now());
                }
            }
            () = tokio::time::sleep_until(tokio::time::Instant::from_std(wake)) => {
                let now = Instant::now();
                let mut updates = Vec::new();
                if debounce.fire_if_due(now) {
                    if let Some(snapshot) = reload(state, account_id, branch_id).await {
                        updates = engine.load(snapshot, Instant::now(), OffsetDateTime::now_utc());
                    }
                }
                updates.extend(engine.tick(Instant::now(), OffsetDateTime::now_utc()));
                if send_updates(socket, account_id, updates).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Earliest of the engine's next rotation deadline and the pending reload.
fn next_wake(engine: &DisplayEngine, debounce: &Debounce, now: Instant) -> Instant {
    let rotation = now + engine.next_wakeup(now);
    debounce.deadline().map_or(rotation, |reload| reload.min(rotation))
}

fn triggers_reload(frame: &Frame) -> bool {
    RELOAD_PREFIXES.contains(&frame.prefix())
}

/// Load a fresh snapshot, retrying transient failures with a fixed delay.
///
/// A deleted account collapses the kiosk into the suspended view.
async fn reload(state: &AppState, account_id: Uuid, branch_id: Option<Uuid>) -> Option<DisplaySnapshot> {
    let display = state.config.display;
    let mut attempt = 0;
    loop {
        match snapshot_svc::load_snapshot(&state.pool, account_id, branch_id, OffsetDateTime::now_utc()).await {
            Ok(Some(snapshot)) => return Some(snapshot),
            Ok(None) => return Some(DisplaySnapshot::empty(Serviceability::Suspended)),
            Err(e) if attempt < display.reload_retries => {
                attempt += 1;
                warn!(%account_id, attempt, error = %e, "display: snapshot reload failed; retrying");
                tokio::time::sleep(display.reload_retry_delay).await;
            }
            Err(e) => {
                tracing::error!(%account_id, error = %e, "display: snapshot reload failed; keeping current view");
                return None;
            }
        }
    }
}

/// Kiosks only send heartbeats; anything else gets an error reply.
async fn handle_inbound(state: &AppState, account_id: Uuid, client_id: Uuid, text: &str) -> Frame {
    let req = match Frame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(%client_id, error = %e, "display: invalid inbound frame");
            return Frame::protocol_error("display", &e);
        }
    };
    if req.is_heartbeat("display") {
        feed::touch(state, account_id, client_id).await;
        return req.done();
    }
    req.error(&ProtocolError::Unsupported(req.syscall.clone()))
}

fn update_frame(account_id: Uuid, update: DisplayUpdate) -> Frame {
    Frame::event("display:update", account_id)
        .with_data("surface", update.surface.as_str())
        .with_data("item", update.item.unwrap_or(Value::Null))
}

async fn send_updates(socket: &mut WebSocket, account_id: Uuid, updates: Vec<DisplayUpdate>) -> Result<(), ()> {
    for update in updates {
        send_frame(socket, &update_frame(account_id, update)).await?;
    }
    Ok(())
}

pub(crate) async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let Ok(text) = serde_json::to_string(frame) else {
        return Err(());
    };
    socket.send(Message::Text(text.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "display_test.rs"]
mod tests;
