//! Break-timer windows against the kiosk's wall clock.

use time::{Duration, OffsetDateTime, Time, UtcOffset};

const SECONDS_PER_DAY: i64 = 86_400;

/// Whether `now` falls inside the inclusive window `[start, end]`.
///
/// A window whose end is earlier than its start spans midnight
/// (`22:00..06:00` contains `23:30` and `05:00`).
#[must_use]
pub fn window_contains(start: Time, end: Time, now: Time) -> bool {
    if start <= end {
        start <= now && now <= end
    } else {
        now >= start || now <= end
    }
}

/// Seconds from `now` until the window closes, assuming `now` is inside it.
#[must_use]
pub fn seconds_until_end(end: Time, now: Time) -> i64 {
    let diff = seconds_of_day(end) - seconds_of_day(now);
    if diff >= 0 { diff } else { diff + SECONDS_PER_DAY }
}

/// Kiosk wall clock for a UTC instant and an offset in minutes.
///
/// Out-of-range offsets fall back to UTC. Sub-second precision is dropped so
/// an inclusive end second stays open for the whole second.
#[must_use]
pub fn local_time(utc: OffsetDateTime, offset_minutes: i32) -> Time {
    let offset = i32::try_from(i64::from(offset_minutes) * 60)
        .ok()
        .and_then(|secs| UtcOffset::from_whole_seconds(secs).ok())
        .unwrap_or(UtcOffset::UTC);
    let local = utc.to_offset(offset).time();
    local.replace_nanosecond(0).unwrap_or(local)
}

/// The UTC instant at which a window that is open at `utc` closes.
#[must_use]
pub fn window_end_instant(end: Time, utc: OffsetDateTime, offset_minutes: i32) -> OffsetDateTime {
    let now_local = local_time(utc, offset_minutes);
    let remaining = seconds_until_end(end, now_local);
    let utc = utc.replace_nanosecond(0).unwrap_or(utc);
    utc + Duration::seconds(remaining)
}

fn seconds_of_day(t: Time) -> i64 {
    i64::from(t.hour()) * 3600 + i64::from(t.minute()) * 60 + i64::from(t.second())
}
