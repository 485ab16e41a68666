use super::*;
use crate::state::test_helpers;
use serde_json::json;
use tokio::time::{Duration, timeout};

async fn recv(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("frame should arrive")
        .expect("channel open")
}

fn display(label: &str) -> SubscriberRole {
    SubscriberRole::Display { branch_id: None, label: Some(label.into()) }
}

#[tokio::test]
async fn publish_reaches_every_subscriber_of_account() {
    let state = test_helpers::test_app_state();
    let account_id = Uuid::new_v4();
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    subscribe(&state, account_id, display("lobby"), tx_a).await;
    subscribe(&state, account_id, SubscriberRole::Dashboard, tx_b).await;

    publish_change(&state, account_id, "website", FeedOp::Update, json!({"id": "w1"})).await;

    for rx in [&mut rx_a, &mut rx_b] {
        let frame = recv(rx).await;
        assert_eq!(frame.syscall, "website:update");
        assert_eq!(frame.account_id, Some(account_id));
        assert_eq!(frame.data["row"], json!({"id": "w1"}));
    }
}

#[tokio::test]
async fn publish_is_isolated_per_account() {
    let state = test_helpers::test_app_state();
    let (tx, mut rx) = mpsc::channel(8);
    subscribe(&state, Uuid::new_v4(), display("lobby"), tx).await;

    publish_change(&state, Uuid::new_v4(), "video", FeedOp::Insert, json!({})).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn full_channel_drops_without_blocking() {
    let state = test_helpers::test_app_state();
    let account_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(1);
    subscribe(&state, account_id, display("lobby"), tx).await;

    publish_change(&state, account_id, "website", FeedOp::Insert, json!(1)).await;
    publish_change(&state, account_id, "website", FeedOp::Insert, json!(2)).await;

    assert_eq!(recv(&mut rx).await.data["row"], json!(1));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn unsubscribe_last_evicts_account() {
    let state = test_helpers::test_app_state();
    let account_id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);
    let client_id = subscribe(&state, account_id, display("lobby"), tx).await;
    assert!(state.feeds.read().await.contains_key(&account_id));

    unsubscribe(&state, account_id, client_id).await;
    assert!(!state.feeds.read().await.contains_key(&account_id));
}

#[tokio::test]
async fn list_displays_excludes_dashboards() {
    let state = test_helpers::test_app_state();
    let account_id = Uuid::new_v4();
    let (tx_a, _rx_a) = mpsc::channel(8);
    let (tx_b, _rx_b) = mpsc::channel(8);
    let kiosk = subscribe(&state, account_id, display("front desk"), tx_a).await;
    subscribe(&state, account_id, SubscriberRole::Dashboard, tx_b).await;

    let displays = list_displays(&state, account_id).await;
    assert_eq!(displays.len(), 1);
    assert_eq!(displays[0].client_id, kiosk);
    assert_eq!(displays[0].label.as_deref(), Some("front desk"));
}

#[tokio::test]
async fn touch_advances_last_seen() {
    let state = test_helpers::test_app_state();
    let account_id = Uuid::new_v4();
    let (tx, _rx) = mpsc::channel(8);
    let client_id = subscribe(&state, account_id, display("lobby"), tx).await;
    let before = list_displays(&state, account_id).await[0].last_seen;

    tokio::time::sleep(Duration::from_millis(5)).await;
    touch(&state, account_id, client_id).await;

    let after = list_displays(&state, account_id).await[0].last_seen;
    assert!(after > before);
}

#[test]
fn change_frame_shape() {
    let account_id = Uuid::new_v4();
    let frame = change_frame(account_id, "break_timer", FeedOp::Delete, json!({"id": "t"}));
    assert_eq!(frame.prefix(), "break_timer");
    assert_eq!(frame.op(), "delete");
    assert_eq!(frame.account_id, Some(account_id));
}
