//! Transactional email.
//!
//! ARCHITECTURE
//! ============
//! Services render an `OutgoingEmail` from one of the HTML templates and hand
//! it to the `Mailer` held in `AppState`. Production uses Resend; without an
//! API key the `LogMailer` writes the message to the trace log instead so
//! local setups never block on delivery.
//!
//! Delivery is best effort from the caller's point of view: account
//! lifecycle changes commit first and a failed send is logged, not rolled
//! back.

use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::Config;

const SUBSCRIPTION_REQUEST_TEMPLATE: &str = include_str!("../../templates/subscription_request.html");
const ACCOUNT_ACTIVATED_TEMPLATE: &str = include_str!("../../templates/account_activated.html");
const ACCOUNT_SUSPENDED_TEMPLATE: &str = include_str!("../../templates/account_suspended.html");

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

impl crate::frame::ErrorCode for EmailError {
    fn error_code(&self) -> &'static str {
        "E_EMAIL_DELIVERY"
    }

    fn retryable(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

// =============================================================================
// MAILERS
// =============================================================================

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

pub struct ResendMailer {
    client: Resend,
    from: String,
}

impl ResendMailer {
    #[must_use]
    pub fn new(api_key: &str, from: impl Into<String>) -> Self {
        Self { client: Resend::new(api_key), from: from.into() }
    }
}

#[async_trait::async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        let to = [email.to.as_str()];
        let message = CreateEmailBaseOptions::new(&self.from, to, &email.subject).with_html(&email.html);
        self.client
            .emails
            .send(message)
            .await
            .map_err(|e| EmailError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// Logs instead of sending. Used when no Resend key is configured.
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "email not sent (no RESEND_API_KEY)");
        Ok(())
    }
}

/// Pick the mailer for this configuration.
#[must_use]
pub fn mailer_from_config(config: &Config) -> std::sync::Arc<dyn Mailer> {
    match &config.resend_api_key {
        Some(key) => std::sync::Arc::new(ResendMailer::new(key, config.resend_from.clone())),
        None => std::sync::Arc::new(LogMailer),
    }
}

/// Send and log the outcome. Never fails the caller.
pub async fn deliver(mailer: &dyn Mailer, email: OutgoingEmail) {
    let to = email.to.clone();
    let subject = email.subject.clone();
    match mailer.send(email).await {
        Ok(()) => tracing::info!(%to, %subject, "email sent"),
        Err(e) => tracing::warn!(%to, %subject, error = %e, "email delivery failed"),
    }
}

// =============================================================================
// TEMPLATES
// =============================================================================

#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub struct SubscriptionRequestNotice<'a> {
    pub company: &'a str,
    pub contact_name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub plan: Option<&'a str>,
    pub message: Option<&'a str>,
}

#[must_use]
pub fn subscription_request_email(to: &str, notice: &SubscriptionRequestNotice<'_>) -> OutgoingEmail {
    let html = SUBSCRIPTION_REQUEST_TEMPLATE
        .replace("{{COMPANY}}", &escape_html(notice.company))
        .replace("{{CONTACT_NAME}}", &escape_html(notice.contact_name))
        .replace("{{EMAIL}}", &escape_html(notice.email))
        .replace("{{PHONE}}", &escape_html(notice.phone.unwrap_or("-")))
        .replace("{{PLAN}}", &escape_html(notice.plan.unwrap_or("-")))
        .replace("{{MESSAGE}}", &escape_html(notice.message.unwrap_or("")));
    OutgoingEmail {
        to: to.to_owned(),
        subject: format!("New subscription request: {}", notice.company),
        html,
    }
}

/// `temporary_password` is included only for freshly provisioned accounts.
#[must_use]
pub fn account_activated_email(
    to: &str,
    name: &str,
    temporary_password: Option<&str>,
    expires_at: Option<OffsetDateTime>,
) -> OutgoingEmail {
    let expires = expires_at
        .and_then(|at| at.date().format(&time::macros::format_description!("[year]-[month]-[day]")).ok())
        .unwrap_or_else(|| "further notice".to_owned());
    let credentials = match temporary_password {
        Some(password) => format!(
            "<p>Sign in with <strong>{}</strong> and the temporary password below, then change it from the dashboard.</p>\n    \
             <p style=\"font-size: 20px; letter-spacing: 2px; font-family: monospace;\">{}</p>",
            escape_html(to),
            escape_html(password)
        ),
        None => format!("<p>Sign in with <strong>{}</strong> and your existing password.</p>", escape_html(to)),
    };
    let html = ACCOUNT_ACTIVATED_TEMPLATE
        .replace("{{NAME}}", &escape_html(name))
        .replace("{{EXPIRES_AT}}", &escape_html(&expires))
        .replace("{{CREDENTIALS}}", &credentials);
    OutgoingEmail { to: to.to_owned(), subject: "Your signdeck account is active".into(), html }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspensionReason {
    Expired,
    Manual,
}

#[must_use]
pub fn account_suspended_email(
    to: &str,
    name: &str,
    reason: SuspensionReason,
    at: OffsetDateTime,
) -> OutgoingEmail {
    let when = at.format(&Rfc3339).unwrap_or_default();
    let reason_text = match reason {
        SuspensionReason::Expired => format!("Your subscription period ended on {when}."),
        SuspensionReason::Manual => format!("Your account was suspended by an administrator on {when}."),
    };
    let html = ACCOUNT_SUSPENDED_TEMPLATE
        .replace("{{NAME}}", &escape_html(name))
        .replace("{{REASON}}", &escape_html(&reason_text));
    OutgoingEmail { to: to.to_owned(), subject: "Your signdeck account is paused".into(), html }
}

// =============================================================================
// TEST SUPPORT
// =============================================================================

/// Collects messages in memory.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<OutgoingEmail>>,
}

#[cfg(test)]
impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "email_test.rs"]
mod tests;
