//! Change-event debouncing for display sessions.
//!
//! A burst of feed events (bulk reorder, toggling several rows) should cost
//! one snapshot reload, not one per event. Each event pushes the reload out
//! by the quiet period, but never beyond `max_delay` after the first event
//! of the burst, so a chatty dashboard cannot starve a kiosk.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debounce {
    quiet: Duration,
    max_delay: Duration,
    first: Option<Instant>,
    last: Option<Instant>,
}

impl Debounce {
    #[must_use]
    pub fn new(quiet: Duration, max_delay: Duration) -> Self {
        Self { quiet, max_delay: max_delay.max(quiet), first: None, last: None }
    }

    /// Record an event at `now`.
    pub fn mark(&mut self, now: Instant) {
        if self.first.is_none() {
            self.first = Some(now);
        }
        self.last = Some(now);
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.first.is_some()
    }

    /// When the pending burst should fire, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        let first = self.first?;
        let last = self.last?;
        Some((last + self.quiet).min(first + self.max_delay))
    }

    /// Returns `true` exactly once per burst, when its deadline has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.first = None;
                self.last = None;
                true
            }
            _ => false,
        }
    }
}
