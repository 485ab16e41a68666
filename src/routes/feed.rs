//! Owner change-feed websocket.
//!
//! Dashboards redeem a one-time ticket (`POST /api/auth/ws-ticket`) at
//! `/api/feed?ticket=...` and then receive every `{table}:{op}` frame
//! published for their account. The socket is push-only; inbound frames other
//! than heartbeats are answered with an error.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::frame::{Frame, ProtocolError};
use crate::routes::ApiError;
use crate::routes::display::send_frame;
use crate::services::{feed, session};
use crate::state::{AppState, SubscriberRole};

pub async fn handle_feed_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return ApiError::plain(StatusCode::UNAUTHORIZED, "E_TICKET_REQUIRED", "ticket required").into_response();
    };

    let account_id = match session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(id)) => id,
        Ok(None) => {
            return ApiError::plain(StatusCode::UNAUTHORIZED, "E_TICKET_INVALID", "invalid or expired ticket")
                .into_response();
        }
        Err(e) => return crate::routes::auth::db_error(e).into_response(),
    };

    ws.on_upgrade(move |socket| run_feed(socket, state, account_id))
}

async fn run_feed(mut socket: WebSocket, state: AppState, account_id: Uuid) {
    let (tx, mut rx) = mpsc::channel::<Frame>(feed::FEED_CHANNEL_CAPACITY);
    let client_id = feed::subscribe(&state, account_id, SubscriberRole::Dashboard, tx).await;

    let welcome = Frame::event("feed:connected", account_id)
        .with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_ok() {
        info!(%client_id, %account_id, "feed: dashboard connected");
        loop {
            tokio::select! {
                msg = socket.recv() => {
                    let Some(Ok(msg)) = msg else { break };
                    match msg {
                        Message::Text(text) => {
                            let reply = inbound_reply(text.as_str());
                            if send_frame(&mut socket, &reply).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                frame = rx.recv() => {
                    let Some(frame) = frame else { break };
                    if send_frame(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    feed::unsubscribe(&state, account_id, client_id).await;
    info!(%client_id, %account_id, "feed: dashboard disconnected");
}

fn inbound_reply(text: &str) -> Frame {
    match Frame::parse(text) {
        Ok(req) if req.is_heartbeat("feed") => req.done(),
        Ok(req) => req.error(&ProtocolError::Unsupported(req.syscall.clone())),
        Err(e) => Frame::protocol_error("feed", &e),
    }
}
