//! Per-account change feed.
//!
//! DESIGN
//! ======
//! Every mutation of an account's content, branches, or lifecycle publishes
//! a frame (`website:update`, `branch:delete`, `account:update`, ...) to the
//! account's feed. Subscribers are kiosk display sessions and owner
//! dashboards, each holding a bounded `mpsc` receiver. Delivery is
//! best-effort: a full channel drops the frame for that subscriber, and
//! display sessions recover by reloading their snapshot on the next event.
//!
//! The hub lives in `AppState::feeds`; an account entry is created on first
//! subscribe and evicted when its last subscriber leaves.

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::frame::Frame;
use crate::state::{AppState, Subscriber, SubscriberRole};

/// Capacity of each subscriber's channel.
pub const FEED_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOp {
    Insert,
    Update,
    Delete,
}

impl FeedOp {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Connected kiosk as reported to the owner dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedDisplay {
    pub client_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub label: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub connected_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
}

// =============================================================================
// SUBSCRIBE / UNSUBSCRIBE
// =============================================================================

/// Register a subscriber on an account's feed and return its client id.
pub async fn subscribe(state: &AppState, account_id: Uuid, role: SubscriberRole, tx: mpsc::Sender<Frame>) -> Uuid {
    let client_id = Uuid::new_v4();
    let now = OffsetDateTime::now_utc();
    let mut feeds = state.feeds.write().await;
    let feed = feeds.entry(account_id).or_default();
    feed.subscribers.insert(client_id, Subscriber { tx, role, connected_at: now, last_seen: now });
    info!(%account_id, %client_id, subscribers = feed.subscribers.len(), "feed subscriber joined");
    client_id
}

/// Remove a subscriber. Evicts the account entry when it was the last one.
pub async fn unsubscribe(state: &AppState, account_id: Uuid, client_id: Uuid) {
    let mut feeds = state.feeds.write().await;
    let Some(feed) = feeds.get_mut(&account_id) else {
        return;
    };
    feed.subscribers.remove(&client_id);
    info!(%account_id, %client_id, remaining = feed.subscribers.len(), "feed subscriber left");
    if feed.subscribers.is_empty() {
        feeds.remove(&account_id);
    }
}

/// Record a heartbeat from a subscriber.
pub async fn touch(state: &AppState, account_id: Uuid, client_id: Uuid) {
    let mut feeds = state.feeds.write().await;
    if let Some(sub) = feeds
        .get_mut(&account_id)
        .and_then(|feed| feed.subscribers.get_mut(&client_id))
    {
        sub.last_seen = OffsetDateTime::now_utc();
    }
}

/// Kiosks currently connected to an account, oldest first.
pub async fn list_displays(state: &AppState, account_id: Uuid) -> Vec<ConnectedDisplay> {
    let feeds = state.feeds.read().await;
    let Some(feed) = feeds.get(&account_id) else {
        return Vec::new();
    };
    let mut displays = feed
        .subscribers
        .iter()
        .filter_map(|(client_id, sub)| match &sub.role {
            SubscriberRole::Display { branch_id, label } => Some(ConnectedDisplay {
                client_id: *client_id,
                branch_id: *branch_id,
                label: label.clone(),
                connected_at: sub.connected_at,
                last_seen: sub.last_seen,
            }),
            SubscriberRole::Dashboard => None,
        })
        .collect::<Vec<_>>();
    displays.sort_by_key(|d| d.connected_at);
    displays
}

// =============================================================================
// PUBLISH
// =============================================================================

/// Send a frame to every subscriber of an account.
pub async fn publish(state: &AppState, account_id: Uuid, frame: &Frame) {
    let feeds = state.feeds.read().await;
    let Some(feed) = feeds.get(&account_id) else {
        return;
    };
    for (client_id, sub) in &feed.subscribers {
        // Best-effort: if a subscriber's channel is full, skip it.
        if sub.tx.try_send(frame.clone()).is_err() {
            tracing::debug!(%account_id, %client_id, syscall = %frame.syscall, "feed frame dropped");
        }
    }
}

/// Build a `{prefix}:{op}` change frame for a row.
#[must_use]
pub fn change_frame(account_id: Uuid, prefix: &str, op: FeedOp, row: Value) -> Frame {
    Frame::event(format!("{prefix}:{}", op.as_str()), account_id).with_data("row", row)
}

/// Publish a row change to an account's feed.
pub async fn publish_change(state: &AppState, account_id: Uuid, prefix: &str, op: FeedOp, row: Value) {
    publish(state, account_id, &change_frame(account_id, prefix, op, row)).await;
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
