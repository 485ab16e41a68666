use super::*;

#[test]
fn event_is_scoped_and_server_originated() {
    let account_id = Uuid::new_v4();
    let frame = Frame::event("website:update", account_id);
    assert_eq!(frame.status, Status::Request);
    assert_eq!(frame.account_id, Some(account_id));
    assert_eq!(frame.from.as_deref(), Some(SERVER_ORIGIN));
    assert!(frame.parent_id.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn done_points_back_at_request() {
    let account_id = Uuid::new_v4();
    let req = Frame::event("display:heartbeat", account_id);
    let done = req.done();
    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.account_id, Some(account_id));
    assert_eq!(done.syscall, "display:heartbeat");
    assert_eq!(done.status, Status::Done);
}

#[test]
fn prefix_and_op_split_on_first_colon() {
    let frame = Frame::request("news_ticker:update", Data::new());
    assert_eq!(frame.prefix(), "news_ticker");
    assert_eq!(frame.op(), "update");

    let bare = Frame::request("ping", Data::new());
    assert_eq!(bare.prefix(), "ping");
    assert_eq!(bare.op(), "");
}

#[test]
fn heartbeat_matches_namespace_and_status() {
    assert!(Frame::request("feed:heartbeat", Data::new()).is_heartbeat("feed"));
    assert!(!Frame::request("feed:heartbeat", Data::new()).is_heartbeat("display"));
    assert!(!Frame::request("feed:heartbeat", Data::new()).done().is_heartbeat("feed"));
}

#[test]
fn parse_accepts_minimal_client_frame() {
    let json = format!(r#"{{"id":"{}","ts":1,"syscall":"display:heartbeat","status":"request"}}"#, Uuid::new_v4());
    let frame = Frame::parse(&json).expect("parse");
    assert!(frame.data.is_empty());
    assert!(frame.parent_id.is_none());
    assert!(frame.from.is_none());
}

#[test]
fn malformed_input_gets_namespaced_error() {
    let err = Frame::parse(r#"{"nope":1}"#).expect_err("missing fields");
    let frame = Frame::protocol_error("display", &err);
    assert_eq!(frame.syscall, "display:error");
    assert_eq!(frame.status, Status::Error);
    assert_eq!(frame.data.get("code").and_then(Value::as_str), Some("E_MALFORMED_FRAME"));
}

#[test]
fn typed_error_reply_carries_code_and_flag() {
    let req = Frame::request("feed:subscribe", Data::new());
    let reply = req.error(&ProtocolError::Unsupported(req.syscall.clone()));
    assert_eq!(reply.status, Status::Error);
    assert_eq!(reply.parent_id, Some(req.id));
    assert_eq!(reply.data.get("code").and_then(Value::as_str), Some("E_UNSUPPORTED_SYSCALL"));
    assert_eq!(reply.data.get("message").and_then(Value::as_str), Some("unsupported syscall: feed:subscribe"));
    assert_eq!(reply.data.get("retryable").and_then(Value::as_bool), Some(false));
}
