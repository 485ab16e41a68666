//! Tenant accounts and their subscription lifecycle.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Stored lifecycle status of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Active,
    Suspended,
}

impl AccountStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Suspended => "suspended",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown account status: {0}")]
pub struct UnknownStatus(String);

impl TryFrom<String> for AccountStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(UnknownStatus(value))
    }
}

/// Whether an account may currently drive kiosk displays.
///
/// Derived from the stored status plus the activation window; `Expired`
/// covers accounts still marked active whose window has closed but that the
/// housekeeping task has not suspended yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Serviceability {
    Active,
    Pending,
    Suspended,
    Expired,
}

impl Serviceability {
    #[must_use]
    pub fn is_serviceable(self) -> bool {
        self == Self::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub status: AccountStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub activated_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub utc_offset_minutes: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Account {
    #[must_use]
    pub fn serviceability(&self, now: OffsetDateTime) -> Serviceability {
        match self.status {
            AccountStatus::Pending => Serviceability::Pending,
            AccountStatus::Suspended => Serviceability::Suspended,
            AccountStatus::Active => {
                if self.activated_at.is_some_and(|start| now < start) {
                    return Serviceability::Pending;
                }
                if self.expires_at.is_some_and(|end| now >= end) {
                    return Serviceability::Expired;
                }
                Serviceability::Active
            }
        }
    }

    /// Whole days left in the activation window, rounded up. `None` when the
    /// account has no end date.
    #[must_use]
    pub fn days_remaining(&self, now: OffsetDateTime) -> Option<i64> {
        let end = self.expires_at?;
        let secs = (end - now).whole_seconds();
        if secs <= 0 {
            return Some(0);
        }
        Some((secs + 86_399) / 86_400)
    }
}
