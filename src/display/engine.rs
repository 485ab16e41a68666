//! Per-kiosk display state machine.
//!
//! DESIGN
//! ======
//! Each surface (website, slideshow, video, notification, ticker, timer)
//! advances independently over its own active set. After every `load` or
//! `tick` the engine renders a JSON view per surface and returns only the
//! surfaces whose view differs from what was last emitted, so the socket
//! loop can forward the result verbatim.
//!
//! The primary region shows the active video if there is one, else the
//! active slideshow, else the website rotation. A non-serviceable account
//! collapses every surface into the single `suspended` surface.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::display::rotation::{Rotatable, Rotation, dwell_secs};
use crate::display::schedule;
use crate::model::account::Serviceability;
use crate::model::content::{BreakTimer, NewsTicker, Notification, Slide, Slideshow, Video, Website};

/// How often an open-window check runs while break timers exist.
pub const TIMER_RECHECK: Duration = Duration::from_secs(1);

/// Longest the session loop sleeps when nothing is scheduled.
pub const IDLE_WAKEUP: Duration = Duration::from_secs(30);

// =============================================================================
// SNAPSHOT + UPDATES
// =============================================================================

/// Everything a kiosk needs, as loaded from the database.
#[derive(Debug, Clone, Serialize)]
pub struct DisplaySnapshot {
    pub serviceability: Serviceability,
    pub utc_offset_minutes: i32,
    pub websites: Vec<Website>,
    pub slideshow: Option<Slideshow>,
    pub slides: Vec<Slide>,
    pub video: Option<Video>,
    pub notifications: Vec<Notification>,
    pub tickers: Vec<NewsTicker>,
    pub timers: Vec<BreakTimer>,
}

impl DisplaySnapshot {
    #[must_use]
    pub fn empty(serviceability: Serviceability) -> Self {
        Self {
            serviceability,
            utc_offset_minutes: 0,
            websites: Vec::new(),
            slideshow: None,
            slides: Vec::new(),
            video: None,
            notifications: Vec::new(),
            tickers: Vec::new(),
            timers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Primary,
    Website,
    Slideshow,
    Video,
    Notification,
    Ticker,
    Timer,
    Suspended,
}

impl Surface {
    pub const ALL: [Surface; 8] = [
        Self::Suspended,
        Self::Primary,
        Self::Website,
        Self::Slideshow,
        Self::Video,
        Self::Notification,
        Self::Ticker,
        Self::Timer,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Website => "website",
            Self::Slideshow => "slideshow",
            Self::Video => "video",
            Self::Notification => "notification",
            Self::Ticker => "ticker",
            Self::Timer => "timer",
            Self::Suspended => "suspended",
        }
    }
}

/// A surface whose visible content changed. `item: None` hides it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayUpdate {
    pub surface: Surface,
    pub item: Option<Value>,
}

// =============================================================================
// ROTATABLE IMPLS
// =============================================================================

impl Rotatable for Website {
    fn rotation_id(&self) -> uuid::Uuid {
        self.id
    }

    fn dwell(&self) -> Duration {
        dwell_secs(self.display_seconds)
    }
}

impl Rotatable for NewsTicker {
    fn rotation_id(&self) -> uuid::Uuid {
        self.id
    }

    fn dwell(&self) -> Duration {
        dwell_secs(self.display_seconds)
    }
}

/// A slide paired with its effective dwell (own duration or slideshow default).
#[derive(Debug, Clone)]
struct SlideEntry {
    slide: Slide,
    dwell: Duration,
}

impl Rotatable for SlideEntry {
    fn rotation_id(&self) -> uuid::Uuid {
        self.slide.id
    }

    fn dwell(&self) -> Duration {
        self.dwell
    }
}

// =============================================================================
// NOTIFICATION POPUP
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PopupPhase {
    Idle,
    Showing { index: usize, until: Instant },
    Hidden { next: usize, until: Instant },
}

/// Notifications pop up one at a time: visible for `display_seconds`, then
/// hidden for that notification's `interval_seconds`, then the next one.
#[derive(Debug, Clone)]
struct Popup {
    items: Vec<Notification>,
    phase: PopupPhase,
}

impl Popup {
    fn new() -> Self {
        Self { items: Vec::new(), phase: PopupPhase::Idle }
    }

    fn sync(&mut self, items: Vec<Notification>, now: Instant) {
        let same_ids =
            self.items.len() == items.len() && self.items.iter().zip(&items).all(|(old, new)| old.id == new.id);
        self.items = items;
        if same_ids {
            return;
        }
        self.phase = self.show(0, now);
    }

    fn show(&self, index: usize, now: Instant) -> PopupPhase {
        match self.items.get(index) {
            Some(n) => PopupPhase::Showing { index, until: now + dwell_secs(n.display_seconds) },
            None => PopupPhase::Idle,
        }
    }

    fn advance_if_due(&mut self, now: Instant) {
        loop {
            match self.phase {
                PopupPhase::Showing { index, until } if now >= until => {
                    let gap = self
                        .items
                        .get(index)
                        .map_or(0, |n| u64::try_from(n.interval_seconds).unwrap_or(0));
                    let next = (index + 1) % self.items.len().max(1);
                    if gap == 0 {
                        self.phase = self.show(next, now);
                    } else {
                        self.phase = PopupPhase::Hidden { next, until: now + Duration::from_secs(gap) };
                    }
                }
                PopupPhase::Hidden { next, until } if now >= until => {
                    self.phase = self.show(next, now);
                }
                _ => return,
            }
        }
    }

    fn current(&self) -> Option<&Notification> {
        match self.phase {
            PopupPhase::Showing { index, .. } => self.items.get(index),
            _ => None,
        }
    }

    fn deadline(&self) -> Option<Instant> {
        match self.phase {
            PopupPhase::Idle => None,
            PopupPhase::Showing { until, .. } | PopupPhase::Hidden { until, .. } => Some(until),
        }
    }
}

// =============================================================================
// ENGINE
// =============================================================================

#[derive(Debug)]
pub struct DisplayEngine {
    serviceability: Serviceability,
    /// Offset reported by the kiosk itself; wins over the account default.
    offset_override: Option<i32>,
    account_offset: i32,
    websites: Rotation<Website>,
    slideshow: Option<Slideshow>,
    slides: Rotation<SlideEntry>,
    video: Option<Video>,
    popup: Popup,
    tickers: Rotation<NewsTicker>,
    timers: Vec<BreakTimer>,
    emitted: HashMap<Surface, Option<Value>>,
}

impl DisplayEngine {
    #[must_use]
    pub fn new(offset_override: Option<i32>) -> Self {
        Self {
            serviceability: Serviceability::Pending,
            offset_override,
            account_offset: 0,
            websites: Rotation::new(),
            slideshow: None,
            slides: Rotation::new(),
            video: None,
            popup: Popup::new(),
            tickers: Rotation::new(),
            timers: Vec::new(),
            emitted: HashMap::new(),
        }
    }

    /// Apply a freshly loaded snapshot and return the surfaces that changed.
    pub fn load(&mut self, snapshot: DisplaySnapshot, now: Instant, wall: OffsetDateTime) -> Vec<DisplayUpdate> {
        self.serviceability = snapshot.serviceability;
        self.account_offset = snapshot.utc_offset_minutes;

        self.websites.sync(snapshot.websites, now);

        let default_dwell = snapshot.slideshow.as_ref().map_or(10, |s| s.slide_seconds);
        let entries = if snapshot.slideshow.is_some() {
            snapshot
                .slides
                .into_iter()
                .map(|slide| {
                    let dwell = dwell_secs(slide.duration_seconds.unwrap_or(default_dwell));
                    SlideEntry { slide, dwell }
                })
                .collect()
        } else {
            Vec::new()
        };
        self.slides.sync(entries, now);
        self.slideshow = snapshot.slideshow;

        self.video = snapshot.video;
        self.popup.sync(snapshot.notifications, now);
        self.tickers.sync(snapshot.tickers, now);
        self.timers = snapshot.timers;

        self.collect_changes(wall)
    }

    /// Advance every surface whose dwell has elapsed.
    pub fn tick(&mut self, now: Instant, wall: OffsetDateTime) -> Vec<DisplayUpdate> {
        self.websites.advance_if_due(now);
        self.slides.advance_if_due(now);
        self.popup.advance_if_due(now);
        self.tickers.advance_if_due(now);
        self.collect_changes(wall)
    }

    /// How long the session may sleep before the next scheduled change.
    #[must_use]
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        let mut wait = IDLE_WAKEUP;
        if !self.serviceability.is_serviceable() {
            return wait;
        }
        if !self.timers.is_empty() {
            wait = wait.min(TIMER_RECHECK);
        }
        let deadlines = [
            self.websites.next_deadline(),
            self.slides.next_deadline(),
            self.popup.deadline(),
            self.tickers.next_deadline(),
        ];
        for deadline in deadlines.into_iter().flatten() {
            wait = wait.min(deadline.saturating_duration_since(now));
        }
        wait
    }

    /// Full current view, one entry per surface.
    #[must_use]
    pub fn view(&self, wall: OffsetDateTime) -> Vec<DisplayUpdate> {
        Surface::ALL
            .into_iter()
            .map(|surface| DisplayUpdate { surface, item: self.render(surface, wall) })
            .collect()
    }

    fn collect_changes(&mut self, wall: OffsetDateTime) -> Vec<DisplayUpdate> {
        let mut changes = Vec::new();
        for update in self.view(wall) {
            let previous = self.emitted.get(&update.surface);
            let first_emit = previous.is_none();
            if first_emit || previous != Some(&update.item) {
                // Hidden surfaces are not announced on the first emission.
                if !(first_emit && update.item.is_none()) {
                    changes.push(update.clone());
                }
                self.emitted.insert(update.surface, update.item);
            }
        }
        changes
    }

    fn utc_offset(&self) -> i32 {
        self.offset_override.unwrap_or(self.account_offset)
    }

    fn render(&self, surface: Surface, wall: OffsetDateTime) -> Option<Value> {
        let serviceable = self.serviceability.is_serviceable();
        if surface == Surface::Suspended {
            return (!serviceable).then(|| json!({ "status": self.serviceability }));
        }
        if !serviceable {
            return None;
        }

        match surface {
            Surface::Primary => Some(json!({ "kind": self.primary_kind() })),
            Surface::Website => self.websites.current().map(|w| {
                json!({
                    "id": w.id,
                    "name": w.name,
                    "url": w.url,
                    "display_seconds": w.display_seconds,
                    "index": self.websites.index(),
                    "count": self.websites.len(),
                })
            }),
            Surface::Slideshow => {
                let show = self.slideshow.as_ref()?;
                let entry = self.slides.current()?;
                Some(json!({
                    "slideshow_id": show.id,
                    "name": show.name,
                    "transition": show.transition,
                    "slide": entry.slide,
                    "dwell_seconds": entry.dwell.as_secs(),
                    "index": self.slides.index(),
                    "count": self.slides.len(),
                }))
            }
            Surface::Video => self.video.as_ref().and_then(|v| serde_json::to_value(v).ok()),
            Surface::Notification => self.popup.current().and_then(|n| serde_json::to_value(n).ok()),
            Surface::Ticker => self.tickers.current().map(|t| {
                json!({
                    "id": t.id,
                    "headline": t.headline,
                    "body": t.body,
                    "index": self.tickers.index(),
                    "count": self.tickers.len(),
                })
            }),
            Surface::Timer => self.render_timer(wall),
            Surface::Suspended => None,
        }
    }

    fn primary_kind(&self) -> &'static str {
        if self.video.is_some() {
            "video"
        } else if self.slideshow.is_some() && !self.slides.is_empty() {
            "slideshow"
        } else if !self.websites.is_empty() {
            "website"
        } else {
            "idle"
        }
    }

    fn render_timer(&self, wall: OffsetDateTime) -> Option<Value> {
        let offset = self.utc_offset();
        let local = schedule::local_time(wall, offset);
        let timer = self
            .timers
            .iter()
            .find(|t| t.is_active && schedule::window_contains(t.start_time, t.end_time, local))?;
        let ends_at = schedule::window_end_instant(timer.end_time, wall, offset);
        Some(json!({
            "id": timer.id,
            "title": timer.title,
            "message": timer.message,
            "ends_at": ends_at.format(&Rfc3339).ok(),
        }))
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
