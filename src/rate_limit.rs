//! In-memory rate limiting for credential checks and public lead capture.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<(scope, key), VecDeque<Instant>>`.
//! Each scope has a per-key limit and a global limit:
//! - Login: 5 attempts per normalized email per 5 minutes, 100 globally/min.
//! - Signup: 3 subscription requests per email per hour, 30 globally/hour.
//!
//! TRADE-OFFS
//! ==========
//! State is per-process. Behind several replicas the effective limit
//! multiplies by the replica count, which is acceptable for brute-force
//! damping.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::env_parse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScope {
    Login,
    Signup,
}

impl LimitScope {
    fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Signup => "signup",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    limit: usize,
    window: Duration,
}

#[derive(Debug, Clone, Copy)]
struct ScopeConfig {
    per_key: Window,
    global: Window,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitConfig {
    login: ScopeConfig,
    signup: ScopeConfig,
}

impl RateLimitConfig {
    fn from_env() -> Self {
        Self {
            login: ScopeConfig {
                per_key: Window {
                    limit: env_parse("RATE_LIMIT_LOGIN_PER_KEY", 5),
                    window: Duration::from_secs(env_parse("RATE_LIMIT_LOGIN_WINDOW_SECS", 300)),
                },
                global: Window {
                    limit: env_parse("RATE_LIMIT_LOGIN_GLOBAL", 100),
                    window: Duration::from_secs(60),
                },
            },
            signup: ScopeConfig {
                per_key: Window {
                    limit: env_parse("RATE_LIMIT_SIGNUP_PER_KEY", 3),
                    window: Duration::from_secs(env_parse("RATE_LIMIT_SIGNUP_WINDOW_SECS", 3600)),
                },
                global: Window {
                    limit: env_parse("RATE_LIMIT_SIGNUP_GLOBAL", 30),
                    window: Duration::from_secs(3600),
                },
            },
        }
    }

    fn scope(&self, scope: LimitScope) -> ScopeConfig {
        match scope {
            LimitScope::Login => self.login,
            LimitScope::Signup => self.signup,
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("too many {scope} attempts (max {limit}/{window_secs}s)")]
    PerKeyExceeded { scope: &'static str, limit: usize, window_secs: u64 },
    #[error("{scope} is busy, try again later (max {limit}/{window_secs}s)")]
    GlobalExceeded { scope: &'static str, limit: usize, window_secs: u64 },
}

impl crate::frame::ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PerKeyExceeded { .. } => "E_RATE_LIMITED",
            Self::GlobalExceeded { .. } => "E_RATE_LIMITED_GLOBAL",
        }
    }

    fn retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    config: RateLimitConfig,
}

#[derive(Default)]
struct RateLimiterInner {
    per_key: HashMap<(LimitScope, String), VecDeque<Instant>>,
    global: HashMap<LimitScope, VecDeque<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(RateLimiterInner::default())), config: RateLimitConfig::from_env() }
    }

    /// Check the per-key and global windows for `scope`, then record the attempt.
    ///
    /// # Errors
    ///
    /// Returns the first window that is already full.
    pub fn check_and_record(&self, scope: LimitScope, key: &str) -> Result<(), RateLimitError> {
        self.check_and_record_at(scope, key, Instant::now())
    }

    fn check_and_record_at(&self, scope: LimitScope, key: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = self.config.scope(scope);

        let global = inner.global.entry(scope).or_default();
        prune_window(global, now, cfg.global.window);
        if global.len() >= cfg.global.limit {
            return Err(RateLimitError::GlobalExceeded {
                scope: scope.as_str(),
                limit: cfg.global.limit,
                window_secs: cfg.global.window.as_secs(),
            });
        }

        let per_key = inner.per_key.entry((scope, key.to_owned())).or_default();
        prune_window(per_key, now, cfg.per_key.window);
        if per_key.len() >= cfg.per_key.limit {
            return Err(RateLimitError::PerKeyExceeded {
                scope: scope.as_str(),
                limit: cfg.per_key.limit,
                window_secs: cfg.per_key.window.as_secs(),
            });
        }

        per_key.push_back(now);
        inner.global.entry(scope).or_default().push_back(now);
        Ok(())
    }

    /// Forget a key's history, e.g. after a successful login.
    pub fn reset(&self, scope: LimitScope, key: &str) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.per_key.remove(&(scope, key.to_owned()));
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
