use super::*;
use crate::model::content::MediaKind;
use time::macros::{datetime, time};
use uuid::Uuid;

const WALL: OffsetDateTime = datetime!(2026-05-04 09:00:00 UTC);

fn website(name: &str, secs: i32) -> Website {
    Website {
        id: Uuid::new_v4(),
        account_id: Uuid::nil(),
        branch_id: None,
        name: name.into(),
        url: format!("https://{name}.example"),
        display_seconds: secs,
        is_active: true,
        display_order: 0,
    }
}

fn notification(title: &str, show: i32, gap: i32) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        account_id: Uuid::nil(),
        branch_id: None,
        title: title.into(),
        message: String::new(),
        image_url: None,
        display_seconds: show,
        interval_seconds: gap,
        is_active: true,
        display_order: 0,
    }
}

fn timer(title: &str, start: time::Time, end: time::Time) -> BreakTimer {
    BreakTimer {
        id: Uuid::new_v4(),
        account_id: Uuid::nil(),
        branch_id: None,
        title: title.into(),
        message: "Back soon".into(),
        start_time: start,
        end_time: end,
        is_active: true,
        display_order: 0,
    }
}

fn slideshow(secs: i32) -> Slideshow {
    Slideshow {
        id: Uuid::new_v4(),
        account_id: Uuid::nil(),
        branch_id: None,
        name: "Lobby".into(),
        slide_seconds: secs,
        transition: "fade".into(),
        is_active: true,
        display_order: 0,
    }
}

fn slide(show: &Slideshow, order: i32, duration: Option<i32>) -> Slide {
    Slide {
        id: Uuid::new_v4(),
        slideshow_id: show.id,
        media_url: format!("/media/{order}.png"),
        media_kind: MediaKind::Image,
        duration_seconds: duration,
        display_order: order,
    }
}

fn active() -> DisplaySnapshot {
    DisplaySnapshot::empty(Serviceability::Active)
}

fn find(updates: &[DisplayUpdate], surface: Surface) -> Option<&DisplayUpdate> {
    updates.iter().find(|u| u.surface == surface)
}

fn item_str<'a>(update: &'a DisplayUpdate, key: &str) -> Option<&'a str> {
    update.item.as_ref()?.get(key)?.as_str()
}

// =============================================================================
// load
// =============================================================================

#[test]
fn initial_load_announces_only_visible_surfaces() {
    let t0 = Instant::now();
    let mut engine = DisplayEngine::new(None);
    let mut snap = active();
    snap.websites = vec![website("menu", 30)];
    let updates = engine.load(snap, t0, WALL);

    assert_eq!(item_str(find(&updates, Surface::Website).unwrap(), "name"), Some("menu"));
    let primary = find(&updates, Surface::Primary).unwrap();
    assert_eq!(item_str(primary, "kind"), Some("website"));
    assert!(find(&updates, Surface::Video).is_none());
    assert!(find(&updates, Surface::Suspended).is_none());
}

#[test]
fn reloading_identical_snapshot_emits_nothing() {
    let t0 = Instant::now();
    let mut engine = DisplayEngine::new(None);
    let mut snap = active();
    snap.websites = vec![website("menu", 30), website("promo", 30)];
    engine.load(snap.clone(), t0, WALL);
    let updates = engine.load(snap, t0 + Duration::from_secs(1), WALL);
    assert!(updates.is_empty(), "unexpected updates: {updates:?}");
}

#[test]
fn suspended_account_hides_everything() {
    let t0 = Instant::now();
    let mut engine = DisplayEngine::new(None);
    let mut snap = active();
    snap.websites = vec![website("menu", 30)];
    engine.load(snap.clone(), t0, WALL);

    snap.serviceability = Serviceability::Suspended;
    let updates = engine.load(snap, t0, WALL);

    let suspended = find(&updates, Surface::Suspended).expect("suspended surface shown");
    assert_eq!(item_str(suspended, "status"), Some("suspended"));
    assert!(find(&updates, Surface::Website).unwrap().item.is_none());
    assert!(find(&updates, Surface::Primary).unwrap().item.is_none());
    assert_eq!(engine.next_wakeup(t0), IDLE_WAKEUP);
}

// =============================================================================
// rotation via tick
// =============================================================================

#[test]
fn websites_rotate_on_tick() {
    let t0 = Instant::now();
    let mut engine = DisplayEngine::new(None);
    let mut snap = active();
    snap.websites = vec![website("a", 10), website("b", 10)];
    engine.load(snap, t0, WALL);

    assert!(engine.tick(t0 + Duration::from_secs(5), WALL).is_empty());
    let updates = engine.tick(t0 + Duration::from_secs(10), WALL);
    assert_eq!(updates.len(), 1);
    assert_eq!(item_str(&updates[0], "name"), Some("b"));
}

#[test]
fn removing_current_website_restarts_rotation_at_first() {
    let t0 = Instant::now();
    let mut engine = DisplayEngine::new(None);
    let a = website("a", 10);
    let b = website("b", 10);
    let c = website("c", 10);
    let mut snap = active();
    snap.websites = vec![a.clone(), b.clone(), c];
    engine.load(snap.clone(), t0, WALL);
    engine.tick(t0 + Duration::from_secs(10), WALL);
    engine.tick(t0 + Duration::from_secs(20), WALL); // now showing "c"

    snap.websites = vec![a, b];
    let updates = engine.load(snap, t0 + Duration::from_secs(21), WALL);
    assert_eq!(item_str(find(&updates, Surface::Website).unwrap(), "name"), Some("a"));
}

#[test]
fn slides_use_own_duration_or_slideshow_default() {
    let t0 = Instant::now();
    let show = slideshow(8);
    let first = slide(&show, 0, Some(3));
    let second = slide(&show, 1, None);
    let mut snap = active();
    snap.slides = vec![first, second.clone()];
    snap.slideshow = Some(show);

    let mut engine = DisplayEngine::new(None);
    let updates = engine.load(snap, t0, WALL);
    assert_eq!(item_str(find(&updates, Surface::Primary).unwrap(), "kind"), Some("slideshow"));
    assert_eq!(engine.next_wakeup(t0), Duration::from_secs(3));

    let updates = engine.tick(t0 + Duration::from_secs(3), WALL);
    let shown = find(&updates, Surface::Slideshow).unwrap().item.as_ref().unwrap();
    assert_eq!(shown["slide"]["id"], serde_json::json!(second.id));
    assert_eq!(shown["dwell_seconds"], serde_json::json!(8));
}

#[test]
fn video_takes_primary_over_slideshow() {
    let t0 = Instant::now();
    let show = slideshow(5);
    let mut snap = active();
    snap.slides = vec![slide(&show, 0, None)];
    snap.slideshow = Some(show);
    snap.video = Some(Video {
        id: Uuid::new_v4(),
        account_id: Uuid::nil(),
        branch_id: None,
        title: "Promo".into(),
        video_url: "/media/promo.mp4".into(),
        muted: true,
        loop_playback: true,
        is_active: true,
        display_order: 0,
    });

    let mut engine = DisplayEngine::new(None);
    let updates = engine.load(snap, t0, WALL);
    assert_eq!(item_str(find(&updates, Surface::Primary).unwrap(), "kind"), Some("video"));
    assert_eq!(item_str(find(&updates, Surface::Video).unwrap(), "title"), Some("Promo"));
}

// =============================================================================
// notifications
// =============================================================================

#[test]
fn notification_popup_alternates_show_and_hide() {
    let t0 = Instant::now();
    let mut snap = active();
    snap.notifications = vec![notification("first", 5, 20), notification("second", 5, 20)];
    let mut engine = DisplayEngine::new(None);

    let updates = engine.load(snap, t0, WALL);
    assert_eq!(item_str(find(&updates, Surface::Notification).unwrap(), "title"), Some("first"));

    let hidden = engine.tick(t0 + Duration::from_secs(5), WALL);
    assert!(find(&hidden, Surface::Notification).unwrap().item.is_none());
    assert_eq!(engine.next_wakeup(t0 + Duration::from_secs(5)), Duration::from_secs(20));

    let shown = engine.tick(t0 + Duration::from_secs(25), WALL);
    assert_eq!(item_str(find(&shown, Surface::Notification).unwrap(), "title"), Some("second"));
}

#[test]
fn zero_interval_notifications_show_back_to_back() {
    let t0 = Instant::now();
    let mut snap = active();
    snap.notifications = vec![notification("first", 5, 0), notification("second", 5, 0)];
    let mut engine = DisplayEngine::new(None);
    engine.load(snap, t0, WALL);

    let updates = engine.tick(t0 + Duration::from_secs(5), WALL);
    assert_eq!(item_str(find(&updates, Surface::Notification).unwrap(), "title"), Some("second"));
}

// =============================================================================
// break timers
// =============================================================================

#[test]
fn break_timer_overlay_follows_local_wall_clock() {
    let t0 = Instant::now();
    let mut snap = active();
    snap.timers = vec![timer("Lunch", time!(12:00), time!(12:30))];
    snap.utc_offset_minutes = 180; // account default UTC+3

    let mut engine = DisplayEngine::new(None);
    let before = engine.load(snap, t0, datetime!(2026-05-04 08:59:00 UTC));
    assert!(find(&before, Surface::Timer).is_none());
    assert_eq!(engine.next_wakeup(t0), TIMER_RECHECK);

    let during = engine.tick(t0, datetime!(2026-05-04 09:10:00 UTC));
    let overlay = find(&during, Surface::Timer).unwrap();
    assert_eq!(item_str(overlay, "title"), Some("Lunch"));
    assert_eq!(item_str(overlay, "ends_at"), Some("2026-05-04T09:30:00Z"));

    // Steady state inside the window produces no further frames.
    assert!(engine.tick(t0, datetime!(2026-05-04 09:10:01 UTC)).is_empty());

    let after = engine.tick(t0, datetime!(2026-05-04 09:30:01 UTC));
    assert!(find(&after, Surface::Timer).unwrap().item.is_none());
}

#[test]
fn break_timer_is_shown_through_its_last_second() {
    let t0 = Instant::now();
    let mut snap = active();
    snap.timers = vec![timer("Lunch", time!(12:00), time!(12:30))];

    let mut engine = DisplayEngine::new(None);
    let updates = engine.load(snap, t0, datetime!(2026-05-04 12:30:00.999 UTC));
    let overlay = find(&updates, Surface::Timer).unwrap();
    assert_eq!(item_str(overlay, "ends_at"), Some("2026-05-04T12:30:00Z"));
}

#[test]
fn kiosk_offset_overrides_account_offset() {
    let t0 = Instant::now();
    let mut snap = active();
    snap.timers = vec![timer("Lunch", time!(12:00), time!(12:30))];
    snap.utc_offset_minutes = 0;

    let mut engine = DisplayEngine::new(Some(180));
    let updates = engine.load(snap, t0, datetime!(2026-05-04 09:15:00 UTC));
    assert!(find(&updates, Surface::Timer).is_some());
}

#[test]
fn idle_engine_sleeps_long() {
    let t0 = Instant::now();
    let mut engine = DisplayEngine::new(None);
    let updates = engine.load(active(), t0, WALL);
    assert_eq!(item_str(find(&updates, Surface::Primary).unwrap(), "kind"), Some("idle"));
    assert_eq!(engine.next_wakeup(t0), IDLE_WAKEUP);
}

#[test]
fn full_view_lists_every_surface() {
    let engine = DisplayEngine::new(None);
    assert_eq!(engine.view(WALL).len(), Surface::ALL.len());
}
