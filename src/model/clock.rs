//! Wall-clock `TIME` values as `"HH:MM"` / `"HH:MM:SS"` strings.
//!
//! Postgres renders `TIME` columns as `"08:30:00"` inside `to_jsonb`, while
//! dashboards submit `"08:30"`. Both parse; serialization always emits
//! `"HH:MM:SS"`.

use serde::{Deserialize, Deserializer, Serializer};
use time::Time;
use time::macros::format_description;

/// Parse `"HH:MM"`, `"HH:MM:SS"`, or `"HH:MM:SS.ffffff"`.
#[must_use]
pub fn parse_clock(raw: &str) -> Option<Time> {
    let raw = raw.trim();
    let whole = raw.split_once('.').map_or(raw, |(whole, _)| whole);
    let long = format_description!("[hour]:[minute]:[second]");
    let short = format_description!("[hour]:[minute]");
    Time::parse(whole, long)
        .or_else(|_| Time::parse(whole, short))
        .ok()
}

#[must_use]
pub fn format_clock(value: Time) -> String {
    format!("{:02}:{:02}:{:02}", value.hour(), value.minute(), value.second())
}

pub fn serialize<S>(value: &Time, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_clock(*value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Time, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_clock(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid clock time: {raw}")))
}
