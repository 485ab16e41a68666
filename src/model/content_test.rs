use super::*;
use serde_json::json;
use time::macros::time;

fn body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("test body must be an object"),
    }
}

// =============================================================================
// ContentKind
// =============================================================================

#[test]
fn slugs_round_trip() {
    for kind in ContentKind::ALL {
        assert_eq!(ContentKind::from_slug(kind.slug()), Some(kind));
    }
    assert_eq!(ContentKind::from_slug("accounts"), None);
}

#[test]
fn only_slideshows_and_videos_are_exclusive() {
    let exclusive: Vec<_> = ContentKind::ALL.into_iter().filter(|k| k.is_exclusive()).collect();
    assert_eq!(exclusive, vec![ContentKind::Slideshow, ContentKind::Video]);
    assert!(!ContentKind::Video.active_by_default());
    assert!(ContentKind::Website.active_by_default());
}

// =============================================================================
// validate_fields
// =============================================================================

#[test]
fn create_website_requires_name_and_url() {
    let err = validate_fields(ContentKind::Website, &body(json!({"name": "Menu"})), WriteMode::Create).unwrap_err();
    assert_eq!(err, FieldError::Missing("url"));
}

#[test]
fn create_website_trims_and_orders_values() {
    let values = validate_fields(
        ContentKind::Website,
        &body(json!({"url": " https://example.com/menu ", "name": "  Menu ", "display_seconds": 45})),
        WriteMode::Create,
    )
    .expect("valid body");
    assert_eq!(
        values,
        vec![
            ("name", FieldValue::Text("Menu".into())),
            ("url", FieldValue::Text("https://example.com/menu".into())),
            ("display_seconds", FieldValue::Int(45)),
        ]
    );
}

#[test]
fn null_notes_store_as_empty_text() {
    for (kind, key) in [
        (ContentKind::Notification, "message"),
        (ContentKind::NewsTicker, "body"),
        (ContentKind::BreakTimer, "message"),
    ] {
        let mut patch = Map::new();
        patch.insert(key.to_owned(), Value::Null);
        let values = validate_fields(kind, &patch, WriteMode::Patch).unwrap();
        assert_eq!(values, vec![(key, FieldValue::Text(String::new()))], "{key} on {kind:?}");
    }

    let blank = validate_fields(ContentKind::Notification, &body(json!({"message": "   "})), WriteMode::Patch).unwrap();
    assert_eq!(blank, vec![("message", FieldValue::Text(String::new()))]);

    let bad = validate_fields(ContentKind::NewsTicker, &body(json!({"body": 7})), WriteMode::Patch);
    assert!(matches!(bad, Err(FieldError::Invalid { field: "body", .. })));
}

#[test]
fn patch_accepts_partial_body_and_ignores_read_only_keys() {
    let values = validate_fields(
        ContentKind::Website,
        &body(json!({"id": "x", "created_at": "y", "is_active": false})),
        WriteMode::Patch,
    )
    .expect("valid patch");
    assert_eq!(values, vec![("is_active", FieldValue::Bool(false))]);
}

#[test]
fn patch_with_nothing_writable_is_empty() {
    let err = validate_fields(ContentKind::Video, &body(json!({"id": "x"})), WriteMode::Patch).unwrap_err();
    assert_eq!(err, FieldError::Empty);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = validate_fields(ContentKind::Video, &body(json!({"colour": "red"})), WriteMode::Patch).unwrap_err();
    assert_eq!(err, FieldError::Unknown("colour".into()));
}

#[test]
fn seconds_bounds_are_enforced() {
    let zero = validate_fields(ContentKind::Website, &body(json!({"display_seconds": 0})), WriteMode::Patch);
    assert!(matches!(zero, Err(FieldError::Invalid { field: "display_seconds", .. })));

    let gap = validate_fields(ContentKind::Notification, &body(json!({"interval_seconds": 0})), WriteMode::Patch);
    assert_eq!(gap, Ok(vec![("interval_seconds", FieldValue::Int(0))]));

    let huge = validate_fields(ContentKind::NewsTicker, &body(json!({"display_seconds": 90_000})), WriteMode::Patch);
    assert!(huge.is_err());
}

#[test]
fn urls_must_be_http_or_local_media() {
    for bad in ["ftp://x", "javascript:alert(1)", "//evil.test/x", "https://", "https:///path"] {
        let res = validate_fields(ContentKind::Website, &body(json!({"url": bad})), WriteMode::Patch);
        assert!(res.is_err(), "expected {bad:?} to be rejected");
    }
    for good in ["https://example.com", "HTTP://example.com/a", "/media/abc.png"] {
        let res = validate_fields(ContentKind::Website, &body(json!({"url": good})), WriteMode::Patch);
        assert!(res.is_ok(), "expected {good:?} to be accepted");
    }
}

#[test]
fn optional_image_url_blank_becomes_null() {
    let values =
        validate_fields(ContentKind::Notification, &body(json!({"image_url": "  "})), WriteMode::Patch).unwrap();
    assert_eq!(values, vec![("image_url", FieldValue::OptionalText(None))]);
}

#[test]
fn branch_id_accepts_uuid_or_null() {
    let id = Uuid::new_v4();
    let values =
        validate_fields(ContentKind::Website, &body(json!({"branch_id": id.to_string()})), WriteMode::Patch).unwrap();
    assert_eq!(values, vec![("branch_id", FieldValue::OptionalUuid(Some(id)))]);

    let cleared = validate_fields(ContentKind::Website, &body(json!({"branch_id": null})), WriteMode::Patch).unwrap();
    assert_eq!(cleared, vec![("branch_id", FieldValue::OptionalUuid(None))]);

    let bad = validate_fields(ContentKind::Website, &body(json!({"branch_id": "nope"})), WriteMode::Patch);
    assert!(bad.is_err());
}

#[test]
fn transition_must_be_known_choice() {
    let ok = validate_fields(ContentKind::Slideshow, &body(json!({"transition": "slide"})), WriteMode::Patch);
    assert!(ok.is_ok());
    let bad = validate_fields(ContentKind::Slideshow, &body(json!({"transition": "spin"})), WriteMode::Patch);
    assert!(bad.is_err());
}

#[test]
fn break_timer_parses_clock_and_rejects_empty_window() {
    let values = validate_fields(
        ContentKind::BreakTimer,
        &body(json!({"title": "Lunch", "start_time": "12:00", "end_time": "12:45"})),
        WriteMode::Create,
    )
    .unwrap();
    assert!(values.contains(&("start_time", FieldValue::Clock(time!(12:00)))));
    assert!(values.contains(&("end_time", FieldValue::Clock(time!(12:45)))));

    let same = validate_fields(
        ContentKind::BreakTimer,
        &body(json!({"title": "Lunch", "start_time": "12:00", "end_time": "12:00:00"})),
        WriteMode::Create,
    );
    assert!(matches!(same, Err(FieldError::Invalid { field: "end_time", .. })));
}

// =============================================================================
// Typed rows decode from to_jsonb output
// =============================================================================

#[test]
fn break_timer_decodes_postgres_json() {
    let row = json!({
        "id": Uuid::new_v4(),
        "account_id": Uuid::new_v4(),
        "branch_id": null,
        "title": "Shift change",
        "message": "",
        "start_time": "22:00:00",
        "end_time": "06:00:00",
        "is_active": true,
        "display_order": 0,
        "created_at": "2026-01-01T00:00:00+00:00",
        "updated_at": "2026-01-01T00:00:00+00:00"
    });
    let timer: BreakTimer = serde_json::from_value(row).expect("decode");
    assert_eq!(timer.start_time, time!(22:00));
    assert_eq!(timer.end_time, time!(6:00));
}
