use super::*;
use time::macros::datetime;

#[test]
fn escape_html_replaces_markup() {
    assert_eq!(escape_html("<b>Tom & \"Jerry\"</b>"), "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;");
    assert_eq!(escape_html("plain"), "plain");
}

#[test]
fn subscription_request_email_fills_every_placeholder() {
    let notice = SubscriptionRequestNotice {
        company: "Acme <Cafe>",
        contact_name: "Sam",
        email: "sam@acme.test",
        phone: None,
        plan: Some("pro"),
        message: Some("Three screens please"),
    };
    let email = subscription_request_email("admin@signdeck.test", &notice);
    assert_eq!(email.to, "admin@signdeck.test");
    assert!(email.subject.contains("Acme <Cafe>"));
    assert!(email.html.contains("Acme &lt;Cafe&gt;"));
    assert!(email.html.contains("sam@acme.test"));
    assert!(email.html.contains("Three screens please"));
    assert!(!email.html.contains("{{"));
}

#[test]
fn account_activated_email_includes_password_and_end_date() {
    let email = account_activated_email(
        "owner@acme.test",
        "Acme",
        Some("TempPass123"),
        Some(datetime!(2026-06-30 12:00 UTC)),
    );
    assert!(email.html.contains("TempPass123"));
    assert!(email.html.contains("2026-06-30"));
    assert!(email.html.contains("owner@acme.test"));
    assert!(!email.html.contains("{{"));
}

#[test]
fn account_activated_email_without_password_or_end_date() {
    let email = account_activated_email("owner@acme.test", "Acme", None, None);
    assert!(email.html.contains("further notice"));
    assert!(email.html.contains("existing password"));
    assert!(!email.html.contains("{{"));
}

#[test]
fn suspended_email_explains_reason() {
    let at = datetime!(2026-05-01 00:00 UTC);
    let expired = account_suspended_email("o@acme.test", "Acme", SuspensionReason::Expired, at);
    assert!(expired.html.contains("subscription period ended"));
    let manual = account_suspended_email("o@acme.test", "Acme", SuspensionReason::Manual, at);
    assert!(manual.html.contains("administrator"));
    assert!(!manual.html.contains("{{"));
}

#[tokio::test]
async fn recording_mailer_keeps_messages() {
    let mailer = RecordingMailer::default();
    deliver(&mailer, account_activated_email("o@acme.test", "Acme", Some("pw"), None)).await;
    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "o@acme.test");
}

#[tokio::test]
async fn log_mailer_never_fails() {
    let email = account_activated_email("o@acme.test", "Acme", Some("pw"), None);
    assert!(LogMailer.send(email).await.is_ok());
}
