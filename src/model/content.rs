//! Content kinds, their typed rows, and the writable-field schema each
//! content table exposes to dashboards.
//!
//! DESIGN
//! ======
//! Content rows travel as JSON (`to_jsonb(row)` on the way out of Postgres),
//! so one generic store serves all six tables. The typed structs here are
//! what the display engine works with; `fields()` drives validation of
//! create/patch bodies before any SQL is built.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::Time;
use uuid::Uuid;

use crate::model::clock;

// =============================================================================
// KINDS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Website,
    Slideshow,
    Video,
    Notification,
    NewsTicker,
    BreakTimer,
}

impl ContentKind {
    pub const ALL: [ContentKind; 6] = [
        Self::Website,
        Self::Slideshow,
        Self::Video,
        Self::Notification,
        Self::NewsTicker,
        Self::BreakTimer,
    ];

    /// Backing table name. Only ever interpolated from this closed set.
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Self::Website => "websites",
            Self::Slideshow => "slideshows",
            Self::Video => "videos",
            Self::Notification => "notifications",
            Self::NewsTicker => "news_tickers",
            Self::BreakTimer => "break_timers",
        }
    }

    /// URL path segment, e.g. `/api/content/news-tickers`.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Website => "websites",
            Self::Slideshow => "slideshows",
            Self::Video => "videos",
            Self::Notification => "notifications",
            Self::NewsTicker => "news-tickers",
            Self::BreakTimer => "break-timers",
        }
    }

    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.slug() == slug)
    }

    /// Syscall prefix for change-feed frames, e.g. `news_ticker:update`.
    #[must_use]
    pub fn event_prefix(self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::Slideshow => "slideshow",
            Self::Video => "video",
            Self::Notification => "notification",
            Self::NewsTicker => "news_ticker",
            Self::BreakTimer => "break_timer",
        }
    }

    /// Kinds where at most one row per account/branch scope may be active.
    #[must_use]
    pub fn is_exclusive(self) -> bool {
        matches!(self, Self::Slideshow | Self::Video)
    }

    /// Whether newly created rows start active when the body is silent.
    #[must_use]
    pub fn active_by_default(self) -> bool {
        !self.is_exclusive()
    }

    #[must_use]
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::Website => WEBSITE_FIELDS,
            Self::Slideshow => SLIDESHOW_FIELDS,
            Self::Video => VIDEO_FIELDS,
            Self::Notification => NOTIFICATION_FIELDS,
            Self::NewsTicker => NEWS_TICKER_FIELDS,
            Self::BreakTimer => BREAK_TIMER_FIELDS,
        }
    }
}

// =============================================================================
// TYPED ROWS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Website {
    pub id: Uuid,
    pub account_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub name: String,
    pub url: String,
    pub display_seconds: i32,
    pub is_active: bool,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slideshow {
    pub id: Uuid,
    pub account_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub name: String,
    pub slide_seconds: i32,
    pub transition: String,
    pub is_active: bool,
    pub display_order: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown media kind: {0}")]
pub struct UnknownMediaKind(String);

impl TryFrom<String> for MediaKind {
    type Error = UnknownMediaKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownMediaKind(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Slide {
    pub id: Uuid,
    pub slideshow_id: Uuid,
    pub media_url: String,
    #[sqlx(try_from = "String")]
    pub media_kind: MediaKind,
    pub duration_seconds: Option<i32>,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub account_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub title: String,
    pub video_url: String,
    pub muted: bool,
    pub loop_playback: bool,
    pub is_active: bool,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub account_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub image_url: Option<String>,
    pub display_seconds: i32,
    pub interval_seconds: i32,
    pub is_active: bool,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsTicker {
    pub id: Uuid,
    pub account_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub headline: String,
    pub body: String,
    pub display_seconds: i32,
    pub is_active: bool,
    pub display_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakTimer {
    pub id: Uuid,
    pub account_id: Uuid,
    pub branch_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    #[serde(with = "clock")]
    pub start_time: Time,
    #[serde(with = "clock")]
    pub end_time: Time,
    pub is_active: bool,
    pub display_order: i32,
}

// =============================================================================
// FIELD SCHEMA
// =============================================================================

/// Upper bound for any dwell/interval field: one day.
pub const MAX_SECONDS: i32 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    /// Free text stored `NOT NULL`; `null` and blanks become `""`.
    Note,
    Url,
    OptionalUrl,
    Seconds { min: i32 },
    Int,
    Bool,
    Clock,
    OptionalUuid,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
}

const fn field(name: &'static str, ty: FieldType, required: bool) -> FieldSpec {
    FieldSpec { name, ty, required }
}

/// Columns every content table shares.
pub const COMMON_FIELDS: &[FieldSpec] = &[
    field("branch_id", FieldType::OptionalUuid, false),
    field("is_active", FieldType::Bool, false),
    field("display_order", FieldType::Int, false),
];

const WEBSITE_FIELDS: &[FieldSpec] = &[
    field("name", FieldType::Text, true),
    field("url", FieldType::Url, true),
    field("display_seconds", FieldType::Seconds { min: 1 }, false),
];

const SLIDESHOW_FIELDS: &[FieldSpec] = &[
    field("name", FieldType::Text, true),
    field("slide_seconds", FieldType::Seconds { min: 1 }, false),
    field("transition", FieldType::Choice(&["fade", "slide", "none"]), false),
];

const VIDEO_FIELDS: &[FieldSpec] = &[
    field("title", FieldType::Text, true),
    field("video_url", FieldType::Url, true),
    field("muted", FieldType::Bool, false),
    field("loop_playback", FieldType::Bool, false),
];

const NOTIFICATION_FIELDS: &[FieldSpec] = &[
    field("title", FieldType::Text, true),
    field("message", FieldType::Note, false),
    field("image_url", FieldType::OptionalUrl, false),
    field("display_seconds", FieldType::Seconds { min: 1 }, false),
    field("interval_seconds", FieldType::Seconds { min: 0 }, false),
];

const NEWS_TICKER_FIELDS: &[FieldSpec] = &[
    field("headline", FieldType::Text, true),
    field("body", FieldType::Note, false),
    field("display_seconds", FieldType::Seconds { min: 1 }, false),
];

const BREAK_TIMER_FIELDS: &[FieldSpec] = &[
    field("title", FieldType::Text, true),
    field("message", FieldType::Note, false),
    field("start_time", FieldType::Clock, true),
    field("end_time", FieldType::Clock, true),
];

/// Keys dashboards echo back from a fetched row; accepted and ignored.
const READ_ONLY_KEYS: &[&str] = &["id", "account_id", "created_at", "updated_at"];

/// A validated value ready to bind into SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    OptionalText(Option<String>),
    Int(i32),
    Bool(bool),
    Clock(Time),
    OptionalUuid(Option<Uuid>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Patch,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("missing required field `{0}`")]
    Missing(&'static str),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("unknown field `{0}`")]
    Unknown(String),
    #[error("no writable fields supplied")]
    Empty,
}

/// Validate a create/patch body against the kind's schema.
///
/// Returns the bindable values in schema order. Create mode enforces required
/// fields; patch mode only validates what is present.
///
/// # Errors
///
/// Returns the first schema violation found.
pub fn validate_fields(
    kind: ContentKind,
    body: &Map<String, Value>,
    mode: WriteMode,
) -> Result<Vec<(&'static str, FieldValue)>, FieldError> {
    let specs = kind.fields().iter().chain(COMMON_FIELDS.iter());

    for key in body.keys() {
        let known = kind.fields().iter().chain(COMMON_FIELDS).any(|spec| spec.name == key.as_str());
        if !known && !READ_ONLY_KEYS.contains(&key.as_str()) {
            return Err(FieldError::Unknown(key.clone()));
        }
    }

    let mut out = Vec::new();
    for spec in specs {
        match body.get(spec.name) {
            Some(raw) => out.push((spec.name, coerce(spec, raw)?)),
            None if spec.required && mode == WriteMode::Create => return Err(FieldError::Missing(spec.name)),
            None => {}
        }
    }

    if kind == ContentKind::BreakTimer && mode == WriteMode::Create {
        let start = out.iter().find(|(name, _)| *name == "start_time");
        let end = out.iter().find(|(name, _)| *name == "end_time");
        if let (Some((_, FieldValue::Clock(start))), Some((_, FieldValue::Clock(end)))) = (start, end) {
            if start == end {
                return Err(FieldError::Invalid {
                    field: "end_time",
                    reason: "must differ from start_time".into(),
                });
            }
        }
    }

    if out.is_empty() && mode == WriteMode::Patch {
        return Err(FieldError::Empty);
    }
    Ok(out)
}

fn coerce(spec: &FieldSpec, raw: &Value) -> Result<FieldValue, FieldError> {
    let invalid = |reason: &str| FieldError::Invalid { field: spec.name, reason: reason.to_owned() };

    match spec.ty {
        FieldType::Text => {
            let text = raw.as_str().map(str::trim).ok_or_else(|| invalid("expected string"))?;
            if text.is_empty() {
                return Err(invalid("must not be empty"));
            }
            Ok(FieldValue::Text(text.to_owned()))
        }
        FieldType::Note => match raw {
            Value::Null => Ok(FieldValue::Text(String::new())),
            Value::String(s) => Ok(FieldValue::Text(s.trim().to_owned())),
            _ => Err(invalid("expected string or null")),
        },
        FieldType::Url => {
            let url = raw.as_str().map(str::trim).ok_or_else(|| invalid("expected string"))?;
            if !is_display_url(url) {
                return Err(invalid("expected http(s) URL or /media path"));
            }
            Ok(FieldValue::Text(url.to_owned()))
        }
        FieldType::OptionalUrl => match raw {
            Value::Null => Ok(FieldValue::OptionalText(None)),
            Value::String(s) if s.trim().is_empty() => Ok(FieldValue::OptionalText(None)),
            Value::String(s) if is_display_url(s.trim()) => Ok(FieldValue::OptionalText(Some(s.trim().to_owned()))),
            _ => Err(invalid("expected http(s) URL, /media path, or null")),
        },
        FieldType::Seconds { min } => {
            let n = raw
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| invalid("expected integer"))?;
            if n < min || n > MAX_SECONDS {
                return Err(invalid(&format!("must be between {min} and {MAX_SECONDS}")));
            }
            Ok(FieldValue::Int(n))
        }
        FieldType::Int => raw
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(FieldValue::Int)
            .ok_or_else(|| invalid("expected integer")),
        FieldType::Bool => raw.as_bool().map(FieldValue::Bool).ok_or_else(|| invalid("expected boolean")),
        FieldType::Clock => raw
            .as_str()
            .and_then(clock::parse_clock)
            .map(FieldValue::Clock)
            .ok_or_else(|| invalid("expected HH:MM")),
        FieldType::OptionalUuid => match raw {
            Value::Null => Ok(FieldValue::OptionalUuid(None)),
            Value::String(s) => s
                .parse::<Uuid>()
                .map(|id| FieldValue::OptionalUuid(Some(id)))
                .map_err(|_| invalid("expected UUID")),
            _ => Err(invalid("expected UUID or null")),
        },
        FieldType::Choice(options) => {
            let choice = raw.as_str().ok_or_else(|| invalid("expected string"))?;
            if !options.contains(&choice) {
                return Err(invalid(&format!("expected one of {}", options.join(", "))));
            }
            Ok(FieldValue::Text(choice.to_owned()))
        }
    }
}

/// Kiosks only load absolute http(s) URLs or media served by this host.
#[must_use]
pub fn is_display_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let has_host = |rest: &str| !rest.is_empty() && !rest.starts_with('/') && !rest.contains(char::is_whitespace);
    if let Some(rest) = lower.strip_prefix("https://") {
        return has_host(rest);
    }
    if let Some(rest) = lower.strip_prefix("http://") {
        return has_host(rest);
    }
    url.starts_with('/') && !url.starts_with("//") && !url.contains(char::is_whitespace)
}

#[cfg(test)]
#[path = "content_test.rs"]
mod tests;
