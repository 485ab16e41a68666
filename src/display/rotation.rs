//! Cyclic rotation through an active set.
//!
//! DESIGN
//! ======
//! A `Rotation` only knows ids, dwell times and "now". When the ordered id
//! list changes it restarts at index 0, so a deleted or deactivated item can
//! never stay current. Edits that keep the id list intact swap payloads in
//! place without disturbing the dwell clock.

use std::time::{Duration, Instant};

use uuid::Uuid;

/// An item that can be rotated: stable identity plus how long it stays up.
pub trait Rotatable {
    fn rotation_id(&self) -> Uuid;
    fn dwell(&self) -> Duration;
}

#[derive(Debug, Clone)]
pub struct Rotation<T> {
    items: Vec<T>,
    index: usize,
    shown_at: Option<Instant>,
}

impl<T> Default for Rotation<T> {
    fn default() -> Self {
        Self { items: Vec::new(), index: 0, shown_at: None }
    }
}

impl<T: Rotatable> Rotation<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active set. Returns `true` when the set membership or
    /// order changed (index reset to 0).
    pub fn sync(&mut self, items: Vec<T>, now: Instant) -> bool {
        let same_ids = self.items.len() == items.len()
            && self
                .items
                .iter()
                .zip(&items)
                .all(|(old, new)| old.rotation_id() == new.rotation_id());

        self.items = items;
        if same_ids {
            return false;
        }

        self.index = 0;
        self.shown_at = if self.items.is_empty() { None } else { Some(now) };
        true
    }

    /// Advance to the next item if the current one's dwell has elapsed.
    /// Returns `true` if the current item changed.
    pub fn advance_if_due(&mut self, now: Instant) -> bool {
        if self.items.len() <= 1 {
            return false;
        }
        let Some(deadline) = self.next_deadline() else {
            return false;
        };
        if now < deadline {
            return false;
        }
        self.index = (self.index + 1) % self.items.len();
        self.shown_at = Some(now);
        true
    }

    #[must_use]
    pub fn current(&self) -> Option<&T> {
        self.items.get(self.index)
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// When the current item is due to be replaced. `None` for empty or
    /// single-item sets, which never advance.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.items.len() <= 1 {
            return None;
        }
        let shown_at = self.shown_at?;
        let dwell = self.current()?.dwell().max(MIN_DWELL);
        Some(shown_at + dwell)
    }
}

/// Floor applied to every dwell so a zero-length item cannot spin the loop.
pub const MIN_DWELL: Duration = Duration::from_secs(1);

/// Clamp a stored seconds column to a usable dwell.
#[must_use]
pub fn dwell_secs(seconds: i32) -> Duration {
    Duration::from_secs(u64::try_from(seconds).unwrap_or(0)).max(MIN_DWELL)
}

#[cfg(test)]
#[path = "rotation_test.rs"]
mod tests;
