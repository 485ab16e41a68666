use super::*;
use serde_json::json;

fn input(value: serde_json::Value) -> SlideInput {
    serde_json::from_value(value).expect("slide input")
}

#[test]
fn create_requires_media_url() {
    let err = validate(&input(json!({})), true).unwrap_err();
    assert!(matches!(err, SlideError::Invalid { field: "media_url", .. }));
}

#[test]
fn create_infers_kind_from_extension() {
    let video = validate(&input(json!({"media_url": "/media/abc.mp4"})), true).unwrap();
    assert_eq!(video.media_kind, Some(MediaKind::Video));

    let unknown = validate(&input(json!({"media_url": "https://cdn.example/photo"})), true).unwrap();
    assert_eq!(unknown.media_kind, Some(MediaKind::Image));
}

#[test]
fn explicit_kind_wins() {
    let values = validate(&input(json!({"media_url": "/media/a.png", "media_kind": "video"})), true).unwrap();
    assert_eq!(values.media_kind, Some(MediaKind::Video));
}

#[test]
fn rejects_non_display_urls() {
    let err = validate(&input(json!({"media_url": "javascript:alert(1)"})), true).unwrap_err();
    assert!(matches!(err, SlideError::Invalid { field: "media_url", .. }));
}

#[test]
fn duration_null_differs_from_absent() {
    let reset = validate(&input(json!({"duration_seconds": null})), false).unwrap();
    assert_eq!(reset.duration_seconds, Some(None));

    let untouched = validate(&input(json!({"display_order": 2})), false).unwrap();
    assert_eq!(untouched.duration_seconds, None);
}

#[test]
fn duration_bounds() {
    assert!(validate(&input(json!({"duration_seconds": 0})), false).is_err());
    assert!(validate(&input(json!({"duration_seconds": MAX_SECONDS + 1})), false).is_err());
    assert!(validate(&input(json!({"duration_seconds": 15})), false).is_ok());
}

#[test]
fn empty_patch_is_rejected() {
    assert!(validate(&input(json!({})), false).is_err());
}
