//! Kiosk snapshot loading.
//!
//! Builds the `DisplaySnapshot` a kiosk's `DisplayEngine` consumes: the
//! account's serviceability plus every active row visible to the kiosk's
//! branch scope. A kiosk bound to a branch sees account-wide rows and that
//! branch's rows; an unbound kiosk sees account-wide rows only.

use serde::de::DeserializeOwned;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::frame::ErrorCode;
use crate::display::DisplaySnapshot;
use crate::model::content::{ContentKind, Slideshow, Video};
use crate::services::account::{self, AccountError};
use crate::services::content::{self, ContentError, ListFilter};
use crate::services::slides::{self, SlideError};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Slides(#[from] SlideError),
    #[error("malformed {kind} row: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for SnapshotError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Account(e) => e.error_code(),
            Self::Content(e) => e.error_code(),
            Self::Slides(e) => e.error_code(),
            Self::Decode { .. } => "E_SNAPSHOT_DECODE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Account(e) => e.retryable(),
            Self::Content(e) => e.retryable(),
            Self::Slides(e) => e.retryable(),
            Self::Decode { .. } => false,
            Self::Database(_) => true,
        }
    }
}

/// Load everything the kiosk for `account_id` should currently show.
///
/// Returns `Ok(None)` for an unknown account. Non-serviceable accounts get an
/// empty snapshot carrying only their status.
///
/// # Errors
///
/// Returns a database or row-decoding error.
pub async fn load_snapshot(
    pool: &PgPool,
    account_id: Uuid,
    branch_id: Option<Uuid>,
    now: OffsetDateTime,
) -> Result<Option<DisplaySnapshot>, SnapshotError> {
    let Some((serviceability, utc_offset_minutes)) = account::serviceability(pool, account_id, now).await? else {
        return Ok(None);
    };
    let mut snapshot = DisplaySnapshot::empty(serviceability);
    snapshot.utc_offset_minutes = utc_offset_minutes;
    if !serviceability.is_serviceable() {
        return Ok(Some(snapshot));
    }

    snapshot.websites = active_rows(pool, ContentKind::Website, account_id, branch_id).await?;
    snapshot.notifications = active_rows(pool, ContentKind::Notification, account_id, branch_id).await?;
    snapshot.tickers = active_rows(pool, ContentKind::NewsTicker, account_id, branch_id).await?;
    snapshot.timers = active_rows(pool, ContentKind::BreakTimer, account_id, branch_id).await?;

    let videos: Vec<Video> = active_rows(pool, ContentKind::Video, account_id, branch_id).await?;
    snapshot.video = prefer_branch(videos, |v| v.branch_id);

    let shows: Vec<Slideshow> = active_rows(pool, ContentKind::Slideshow, account_id, branch_id).await?;
    snapshot.slideshow = prefer_branch(shows, |s| s.branch_id);
    if let Some(show) = &snapshot.slideshow {
        snapshot.slides = slides::list(pool, account_id, show.id).await?;
    }

    Ok(Some(snapshot))
}

/// Active rows of `kind` visible to the kiosk's branch scope, in display order.
async fn active_rows<T: DeserializeOwned + HasBranch>(
    pool: &PgPool,
    kind: ContentKind,
    account_id: Uuid,
    branch_id: Option<Uuid>,
) -> Result<Vec<T>, SnapshotError> {
    let filter = ListFilter { active_only: true, branch_id };
    let rows = content::list(pool, kind, account_id, filter).await?;
    let mut typed = Vec::with_capacity(rows.len());
    for row in rows {
        let item: T = serde_json::from_value(row).map_err(|source| SnapshotError::Decode {
            kind: kind.event_prefix(),
            source,
        })?;
        if branch_id.is_some() || item.branch().is_none() {
            typed.push(item);
        }
    }
    Ok(typed)
}

/// Exclusive kinds may have one active account-wide row and one active
/// branch row; the branch row wins.
fn prefer_branch<T>(rows: Vec<T>, branch_of: impl Fn(&T) -> Option<Uuid>) -> Option<T> {
    let mut fallback = None;
    for row in rows {
        if branch_of(&row).is_some() {
            return Some(row);
        }
        if fallback.is_none() {
            fallback = Some(row);
        }
    }
    fallback
}

trait HasBranch {
    fn branch(&self) -> Option<Uuid>;
}

macro_rules! has_branch {
    ($($ty:ty),*) => {
        $(impl HasBranch for $ty {
            fn branch(&self) -> Option<Uuid> {
                self.branch_id
            }
        })*
    };
}

has_branch!(
    crate::model::content::Website,
    Slideshow,
    Video,
    crate::model::content::Notification,
    crate::model::content::NewsTicker,
    crate::model::content::BreakTimer
);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Row {
        name: &'static str,
        branch_id: Option<Uuid>,
    }

    #[test]
    fn prefer_branch_picks_branch_row_over_account_wide() {
        let branch = Uuid::new_v4();
        let rows = vec![
            Row { name: "global", branch_id: None },
            Row { name: "local", branch_id: Some(branch) },
        ];
        let picked = prefer_branch(rows, |r| r.branch_id).expect("row");
        assert_eq!(picked.name, "local");
    }

    #[test]
    fn prefer_branch_falls_back_to_first_row() {
        let rows = vec![Row { name: "a", branch_id: None }, Row { name: "b", branch_id: None }];
        assert_eq!(prefer_branch(rows, |r| r.branch_id).map(|r| r.name), Some("a"));
        assert_eq!(prefer_branch(Vec::<Row>::new(), |r| r.branch_id), None);
    }

    #[cfg(feature = "live-db-tests")]
    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn suspended_account_gets_empty_snapshot() {
        use crate::model::account::Serviceability;
        use crate::state::test_helpers::{integration_pool, seed_account};

        let pool = integration_pool().await;
        let account_id = seed_account(&pool, "suspended").await;
        let snapshot = load_snapshot(&pool, account_id, None, OffsetDateTime::now_utc())
            .await
            .expect("load")
            .expect("account exists");
        assert_eq!(snapshot.serviceability, Serviceability::Suspended);
        assert!(snapshot.websites.is_empty());

        let missing = load_snapshot(&pool, Uuid::new_v4(), None, OffsetDateTime::now_utc()).await.expect("load");
        assert!(missing.is_none());
    }
}
