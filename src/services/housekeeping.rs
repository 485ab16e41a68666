//! Housekeeping service: periodic account-lifecycle sweep.
//!
//! DESIGN
//! ======
//! A background task wakes every `housekeeping_interval`, suspends active
//! accounts whose activation window has closed, then purges expired sessions
//! and websocket tickets. Suspension emails and feed events go out after the
//! UPDATE commits, so a failed send never rolls back the status change.
//! Connected kiosks observe the suspension through the `account:update` feed
//! event and reload into the suspended view.

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::services::email::{self, SuspensionReason};
use crate::services::{account, session};
use crate::state::AppState;

/// Spawn the background housekeeping task. Returns a handle for shutdown.
pub fn spawn_housekeeping_task(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(state.config.housekeeping_interval);
        loop {
            interval.tick().await;
            sweep(&state).await;
        }
    })
}

/// One housekeeping pass. Failures are logged and retried on the next tick.
pub async fn sweep(state: &AppState) {
    suspend_expired(state).await;

    match session::purge_expired(&state.pool).await {
        Ok((0, 0)) => {}
        Ok((sessions, tickets)) => info!(sessions, tickets, "purged expired sessions"),
        Err(e) => error!(error = %e, "session purge failed"),
    }
}

async fn suspend_expired(state: &AppState) {
    let expired = match account::suspend_expired(&state.pool).await {
        Ok(rows) => rows,
        Err(e) => {
            error!(error = %e, "expired-account sweep failed");
            return;
        }
    };

    let now = OffsetDateTime::now_utc();
    for acct in &expired {
        info!(account_id = %acct.id, expires_at = ?acct.expires_at, "account expired; suspended");
        account::publish_update(state, acct).await;
        let at = acct.expires_at.unwrap_or(now);
        let notice = email::account_suspended_email(&acct.email, &acct.name, SuspensionReason::Expired, at);
        email::deliver(state.mailer.as_ref(), notice).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "live-db-tests")]
    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn sweep_suspends_lapsed_accounts_and_notifies() {
        use crate::model::account::AccountStatus;
        use crate::services::email::RecordingMailer;
        use crate::state::SubscriberRole;
        use crate::state::test_helpers::{app_state_with_pool, integration_pool, seed_account, seed_subscriber};
        use std::sync::Arc;
        use tokio::sync::mpsc;

        let pool = integration_pool().await;
        let lapsed = seed_account(&pool, "active").await;
        let current = seed_account(&pool, "active").await;
        sqlx::query("UPDATE accounts SET expires_at = now() - interval '1 minute' WHERE id = $1")
            .bind(lapsed)
            .execute(&pool)
            .await
            .expect("backdate");

        let mailer = Arc::new(RecordingMailer::default());
        let state = app_state_with_pool(pool, mailer.clone());
        let (tx, mut rx) = mpsc::channel(4);
        seed_subscriber(&state, lapsed, SubscriberRole::Display { branch_id: None, label: None }, tx).await;

        sweep(&state).await;

        assert_eq!(account::get(&state.pool, lapsed).await.expect("get").status, AccountStatus::Suspended);
        assert_eq!(account::get(&state.pool, current).await.expect("get").status, AccountStatus::Active);
        assert_eq!(rx.recv().await.expect("feed event").syscall, "account:update");
        assert_eq!(mailer.sent().len(), 1);
    }
}
