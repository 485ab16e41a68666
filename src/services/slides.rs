//! Slides: ordered media items belonging to a slideshow.
//!
//! Slides carry no `account_id`; every query joins through the parent
//! slideshow so a caller can only reach slides of its own account.

use serde::{Deserialize, Deserializer};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::model::content::{MAX_SECONDS, MediaKind, Slide, is_display_url};
use crate::services::feed::{self, FeedOp};
use crate::services::media;
use crate::state::AppState;

const SLIDE_COLUMNS: &str = "s.id, s.slideshow_id, s.media_url, s.media_kind, s.duration_seconds, s.display_order";

#[derive(Debug, thiserror::Error)]
pub enum SlideError {
    #[error("slideshow not found: {0}")]
    SlideshowNotFound(Uuid),
    #[error("slide not found: {0}")]
    NotFound(Uuid),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("reorder list must contain distinct ids of this slideshow's slides")]
    InvalidReorder,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for SlideError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SlideshowNotFound(_) => "E_SLIDESHOW_NOT_FOUND",
            Self::NotFound(_) => "E_SLIDE_NOT_FOUND",
            Self::Invalid { .. } => "E_INVALID_FIELD",
            Self::InvalidReorder => "E_INVALID_REORDER",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Distinguishes an explicit `null` from an absent key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlideInput {
    pub media_url: Option<String>,
    pub media_kind: Option<MediaKind>,
    /// `Some(None)` resets the slide to the slideshow's default dwell.
    #[serde(default, deserialize_with = "present")]
    pub duration_seconds: Option<Option<i32>>,
    pub display_order: Option<i32>,
}

/// Validated column values for an insert or update.
#[derive(Debug, Default, PartialEq)]
struct SlideValues {
    media_url: Option<String>,
    media_kind: Option<MediaKind>,
    duration_seconds: Option<Option<i32>>,
    display_order: Option<i32>,
}

fn validate(input: &SlideInput, creating: bool) -> Result<SlideValues, SlideError> {
    let invalid = |field, reason: &str| SlideError::Invalid { field, reason: reason.to_owned() };

    let media_url = match input.media_url.as_deref().map(str::trim) {
        Some(url) if is_display_url(url) => Some(url.to_owned()),
        Some(_) => return Err(invalid("media_url", "expected http(s) URL or /media path")),
        None if creating => return Err(invalid("media_url", "required")),
        None => None,
    };

    let media_kind = match (input.media_kind, media_url.as_deref()) {
        (Some(kind), _) => Some(kind),
        (None, Some(url)) if creating => Some(media::classify(url).map_or(MediaKind::Image, |(_, kind)| kind)),
        _ => None,
    };

    if let Some(Some(secs)) = input.duration_seconds {
        if !(1..=MAX_SECONDS).contains(&secs) {
            return Err(invalid("duration_seconds", &format!("must be between 1 and {MAX_SECONDS}")));
        }
    }

    let values = SlideValues {
        media_url,
        media_kind,
        duration_seconds: input.duration_seconds,
        display_order: input.display_order,
    };
    if !creating && values == SlideValues::default() {
        return Err(invalid("body", "no writable fields supplied"));
    }
    Ok(values)
}

async fn ensure_slideshow(pool: &PgPool, account_id: Uuid, slideshow_id: Uuid) -> Result<(), SlideError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM slideshows WHERE id = $1 AND account_id = $2)")
        .bind(slideshow_id)
        .bind(account_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(SlideError::SlideshowNotFound(slideshow_id));
    }
    Ok(())
}

fn slide_json(slide: &Slide) -> serde_json::Value {
    serde_json::to_value(slide).unwrap_or_default()
}

// =============================================================================
// OPERATIONS
// =============================================================================

pub async fn list(pool: &PgPool, account_id: Uuid, slideshow_id: Uuid) -> Result<Vec<Slide>, SlideError> {
    ensure_slideshow(pool, account_id, slideshow_id).await?;
    let rows = sqlx::query_as::<_, Slide>(&format!(
        "SELECT {SLIDE_COLUMNS} FROM slides s WHERE s.slideshow_id = $1 ORDER BY s.display_order, s.created_at"
    ))
    .bind(slideshow_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Append a slide. Without an explicit order it goes after the current last slide.
pub async fn add(state: &AppState, account_id: Uuid, slideshow_id: Uuid, input: &SlideInput) -> Result<Slide, SlideError> {
    let values = validate(input, true)?;
    ensure_slideshow(&state.pool, account_id, slideshow_id).await?;

    let slide = sqlx::query_as::<_, Slide>(&format!(
        "INSERT INTO slides AS s (slideshow_id, media_url, media_kind, duration_seconds, display_order)
         VALUES ($1, $2, $3, $4,
                 COALESCE($5, (SELECT COALESCE(MAX(display_order) + 1, 0) FROM slides WHERE slideshow_id = $1)))
         RETURNING {SLIDE_COLUMNS}"
    ))
    .bind(slideshow_id)
    .bind(values.media_url)
    .bind(values.media_kind.unwrap_or(MediaKind::Image).as_str())
    .bind(values.duration_seconds.flatten())
    .bind(values.display_order)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(%account_id, %slideshow_id, slide_id = %slide.id, "slide added");
    feed::publish_change(state, account_id, "slide", FeedOp::Insert, slide_json(&slide)).await;
    Ok(slide)
}

pub async fn update(
    state: &AppState,
    account_id: Uuid,
    slideshow_id: Uuid,
    slide_id: Uuid,
    input: &SlideInput,
) -> Result<Slide, SlideError> {
    let values = validate(input, false)?;
    ensure_slideshow(&state.pool, account_id, slideshow_id).await?;

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE slides AS s SET ");
    let mut set = qb.separated(", ");
    if let Some(url) = values.media_url {
        set.push("media_url = ").push_bind_unseparated(url);
    }
    if let Some(kind) = values.media_kind {
        set.push("media_kind = ").push_bind_unseparated(kind.as_str());
    }
    if let Some(duration) = values.duration_seconds {
        set.push("duration_seconds = ").push_bind_unseparated(duration);
    }
    if let Some(order) = values.display_order {
        set.push("display_order = ").push_bind_unseparated(order);
    }
    qb.push(" WHERE s.id = ").push_bind(slide_id);
    qb.push(" AND s.slideshow_id = ").push_bind(slideshow_id);
    qb.push(format!(" RETURNING {SLIDE_COLUMNS}"));

    let slide = qb
        .build_query_as::<Slide>()
        .fetch_optional(&state.pool)
        .await?
        .ok_or(SlideError::NotFound(slide_id))?;

    feed::publish_change(state, account_id, "slide", FeedOp::Update, slide_json(&slide)).await;
    Ok(slide)
}

pub async fn remove(state: &AppState, account_id: Uuid, slideshow_id: Uuid, slide_id: Uuid) -> Result<(), SlideError> {
    ensure_slideshow(&state.pool, account_id, slideshow_id).await?;
    let slide = sqlx::query_as::<_, Slide>(&format!(
        "DELETE FROM slides AS s WHERE s.id = $1 AND s.slideshow_id = $2 RETURNING {SLIDE_COLUMNS}"
    ))
    .bind(slide_id)
    .bind(slideshow_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(SlideError::NotFound(slide_id))?;

    tracing::info!(%account_id, %slideshow_id, %slide_id, "slide removed");
    feed::publish_change(state, account_id, "slide", FeedOp::Delete, slide_json(&slide)).await;
    Ok(())
}

/// Set each slide's order to its position in `ids`.
pub async fn reorder(
    state: &AppState,
    account_id: Uuid,
    slideshow_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Slide>, SlideError> {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    if !ids.iter().all(|id| seen.insert(*id)) {
        return Err(SlideError::InvalidReorder);
    }
    ensure_slideshow(&state.pool, account_id, slideshow_id).await?;

    let mut tx = state.pool.begin().await?;
    let mut slides = Vec::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        let order = i32::try_from(position).map_err(|_| SlideError::InvalidReorder)?;
        let slide = sqlx::query_as::<_, Slide>(&format!(
            "UPDATE slides AS s SET display_order = $3 WHERE s.id = $1 AND s.slideshow_id = $2 RETURNING {SLIDE_COLUMNS}"
        ))
        .bind(id)
        .bind(slideshow_id)
        .bind(order)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(SlideError::InvalidReorder)?;
        slides.push(slide);
    }
    tx.commit().await?;

    for slide in &slides {
        feed::publish_change(state, account_id, "slide", FeedOp::Update, slide_json(slide)).await;
    }
    Ok(slides)
}

#[cfg(test)]
#[path = "slides_test.rs"]
mod tests;
