//! Frame: the JSON envelope on both signdeck websockets.
//!
//! ARCHITECTURE
//! ============
//! The server pushes two families of frames, each scoped to one account:
//! - change-feed events `{table}:{insert|update|delete}` carrying the row
//! - kiosk instructions `display:connected` / `display:update`
//!
//! Clients only ever send `{namespace}:heartbeat`. A reply references its
//! request through `parent_id` and is either `done` or `error`; input that
//! does not parse at all gets a free-standing `{namespace}:error` frame.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Value of `from` on frames the server originates.
pub const SERVER_ORIGIN: &str = "server";

/// Flat key-value payload.
pub type Data = HashMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Request,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Milliseconds since Unix epoch.
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    #[serde(default)]
    pub from: Option<String>,
    pub syscall: String,
    pub status: Status,
    #[serde(default)]
    pub data: Data,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Grepable error code and retryable flag, shared by error frames and
/// HTTP error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Why an inbound socket message was refused.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported syscall: {0}")]
    Unsupported(String),
}

impl ErrorCode for ProtocolError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "E_MALFORMED_FRAME",
            Self::Unsupported(_) => "E_UNSUPPORTED_SYSCALL",
        }
    }
}

fn error_data(err: &(impl ErrorCode + ?Sized)) -> Data {
    let mut data = Data::new();
    data.insert("code".into(), Value::from(err.error_code()));
    data.insert("message".into(), Value::from(err.to_string()));
    data.insert("retryable".into(), Value::from(err.retryable()));
    data
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn request(syscall: impl Into<String>, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            ts: now_ms(),
            account_id: None,
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    /// Server-originated push for one account.
    #[must_use]
    pub fn event(syscall: impl Into<String>, account_id: Uuid) -> Self {
        let mut frame = Self::request(syscall, Data::new());
        frame.account_id = Some(account_id);
        frame.from = Some(SERVER_ORIGIN.to_owned());
        frame
    }

    /// Decode one inbound text message.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Malformed` if `text` is not a frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Free-standing error for input that never became a request.
    #[must_use]
    pub fn protocol_error(namespace: &str, err: &ProtocolError) -> Self {
        let mut frame = Self::request(format!("{namespace}:error"), error_data(err));
        frame.status = Status::Error;
        frame.from = Some(SERVER_ORIGIN.to_owned());
        frame
    }

    #[must_use]
    pub fn done(&self) -> Self {
        self.reply(Status::Done, Data::new())
    }

    #[must_use]
    pub fn error(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        self.reply(Status::Error, error_data(err))
    }

    fn reply(&self, status: Status, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: Some(self.id),
            ts: now_ms(),
            account_id: self.account_id,
            from: Some(SERVER_ORIGIN.to_owned()),
            syscall: self.syscall.clone(),
            status,
            data,
        }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// ROUTING
// =============================================================================

impl Frame {
    /// Table or namespace part of the syscall: `website` in `website:update`.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.syscall.split_once(':').map_or(self.syscall.as_str(), |(prefix, _)| prefix)
    }

    /// Operation part of the syscall; empty when there is no `:`.
    #[must_use]
    pub fn op(&self) -> &str {
        self.syscall.split_once(':').map_or("", |(_, op)| op)
    }

    /// `{namespace}:heartbeat` for the given namespace.
    #[must_use]
    pub fn is_heartbeat(&self, namespace: &str) -> bool {
        self.status == Status::Request && self.prefix() == namespace && self.op() == "heartbeat"
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
