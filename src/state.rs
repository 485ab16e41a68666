//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, the per-account change-feed hub, and the
//! pluggable collaborators (mailer, media store). The feed hub is the only
//! in-memory mutable state; content itself always lives in Postgres.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::frame::Frame;
use crate::rate_limit::RateLimiter;
use crate::services::email::Mailer;
use crate::services::media::MediaStore;

// =============================================================================
// FEED SUBSCRIBERS
// =============================================================================

/// What kind of client is listening on an account's feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriberRole {
    /// A public kiosk page, optionally scoped to one branch.
    Display { branch_id: Option<Uuid>, label: Option<String> },
    /// An authenticated owner dashboard.
    Dashboard,
}

#[derive(Debug, Clone)]
pub struct Subscriber {
    pub tx: mpsc::Sender<Frame>,
    pub role: SubscriberRole,
    pub connected_at: OffsetDateTime,
    pub last_seen: OffsetDateTime,
}

/// Live subscribers for one account.
#[derive(Debug, Default)]
pub struct FeedState {
    /// `client_id` -> subscriber.
    pub subscribers: HashMap<Uuid, Subscriber>,
}

impl FeedState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum; every field is
/// Arc-wrapped or cheaply cloneable.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    /// `account_id` -> live feed subscribers.
    pub feeds: Arc<RwLock<HashMap<Uuid, FeedState>>>,
    pub mailer: Arc<dyn Mailer>,
    pub media: Arc<dyn MediaStore>,
    /// Login attempts and public subscription requests.
    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: Config, mailer: Arc<dyn Mailer>, media: Arc<dyn MediaStore>) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            feeds: Arc::new(RwLock::new(HashMap::new())),
            mailer,
            media,
            rate_limiter: RateLimiter::new(),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
