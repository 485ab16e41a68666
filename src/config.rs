//! Runtime configuration loaded from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` calls `dotenvy::dotenv()` before `Config::from_env`, so a local
//! `.env` file and the process environment are equivalent sources. Every knob
//! has a default except `DATABASE_URL`.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MEDIA_DIR: &str = "media";
const DEFAULT_MEDIA_BASE_URL: &str = "/media";
const DEFAULT_MEDIA_MAX_BYTES: usize = 200 * 1024 * 1024;
const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;
const DEFAULT_HOUSEKEEPING_INTERVAL_SECS: u64 = 60;
const DEFAULT_DISPLAY_DEBOUNCE_MS: u64 = 500;
const DEFAULT_DISPLAY_DEBOUNCE_MAX_MS: u64 = 3_000;
const DEFAULT_DISPLAY_RELOAD_RETRIES: usize = 3;
const DEFAULT_DISPLAY_RELOAD_RETRY_MS: u64 = 2_000;
const DEFAULT_RESEND_FROM: &str = "signdeck <noreply@signdeck.local>";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    /// Directory uploaded media is written to and served from.
    pub media_dir: PathBuf,
    /// Public URL prefix for uploaded media.
    pub media_base_url: String,
    pub media_max_bytes: usize,
    pub resend_api_key: Option<String>,
    pub resend_from: String,
    /// Recipient for new subscription-request notices.
    pub admin_notify_email: Option<String>,
    pub cookie_secure: bool,
    pub session_ttl_hours: i64,
    pub housekeeping_interval: Duration,
    pub display: DisplayConfig,
    pub bootstrap_admin: Option<(String, String)>,
}

/// Tuning knobs for kiosk display sessions.
#[derive(Debug, Clone, Copy)]
pub struct DisplayConfig {
    /// Quiet period after a change event before the snapshot is reloaded.
    pub debounce: Duration,
    /// Upper bound on how long a burst of change events can defer a reload.
    pub debounce_max: Duration,
    pub reload_retries: usize,
    pub reload_retry_delay: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DISPLAY_DEBOUNCE_MS),
            debounce_max: Duration::from_millis(DEFAULT_DISPLAY_DEBOUNCE_MAX_MS),
            reload_retries: DEFAULT_DISPLAY_RELOAD_RETRIES,
            reload_retry_delay: Duration::from_millis(DEFAULT_DISPLAY_RELOAD_RETRY_MS),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `DATABASE_URL` is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        Ok(Self::with_database_url(database_url))
    }

    /// Build a config from environment knobs around an explicit database URL.
    #[must_use]
    pub fn with_database_url(database_url: String) -> Self {
        let bootstrap_admin = match (
            non_empty_var("BOOTSTRAP_ADMIN_EMAIL"),
            non_empty_var("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        };

        Self {
            database_url,
            port: env_parse("PORT", DEFAULT_PORT),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            media_dir: non_empty_var("MEDIA_DIR").map_or_else(|| PathBuf::from(DEFAULT_MEDIA_DIR), PathBuf::from),
            media_base_url: non_empty_var("MEDIA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MEDIA_BASE_URL.to_owned())
                .trim_end_matches('/')
                .to_owned(),
            media_max_bytes: env_parse("MEDIA_MAX_BYTES", DEFAULT_MEDIA_MAX_BYTES),
            resend_api_key: non_empty_var("RESEND_API_KEY"),
            resend_from: non_empty_var("RESEND_FROM").unwrap_or_else(|| DEFAULT_RESEND_FROM.to_owned()),
            admin_notify_email: non_empty_var("ADMIN_NOTIFY_EMAIL"),
            cookie_secure: env_bool("COOKIE_SECURE").unwrap_or(false),
            session_ttl_hours: env_parse("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS),
            housekeeping_interval: Duration::from_secs(env_parse(
                "HOUSEKEEPING_INTERVAL_SECS",
                DEFAULT_HOUSEKEEPING_INTERVAL_SECS,
            )),
            display: DisplayConfig {
                debounce: Duration::from_millis(env_parse("DISPLAY_DEBOUNCE_MS", DEFAULT_DISPLAY_DEBOUNCE_MS)),
                debounce_max: Duration::from_millis(env_parse(
                    "DISPLAY_DEBOUNCE_MAX_MS",
                    DEFAULT_DISPLAY_DEBOUNCE_MAX_MS,
                )),
                reload_retries: env_parse("DISPLAY_RELOAD_RETRIES", DEFAULT_DISPLAY_RELOAD_RETRIES),
                reload_retry_delay: Duration::from_millis(env_parse(
                    "DISPLAY_RELOAD_RETRY_MS",
                    DEFAULT_DISPLAY_RELOAD_RETRY_MS,
                )),
            },
            bootstrap_admin,
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
