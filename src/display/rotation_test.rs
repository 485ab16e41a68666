use super::*;

#[derive(Debug, Clone, PartialEq)]
struct Item {
    id: Uuid,
    secs: u64,
    label: &'static str,
}

impl Rotatable for Item {
    fn rotation_id(&self) -> Uuid {
        self.id
    }

    fn dwell(&self) -> Duration {
        Duration::from_secs(self.secs)
    }
}

fn item(label: &'static str, secs: u64) -> Item {
    Item { id: Uuid::new_v4(), secs, label }
}

#[test]
fn empty_rotation_has_nothing_current() {
    let rot: Rotation<Item> = Rotation::new();
    assert!(rot.current().is_none());
    assert!(rot.is_empty());
    assert!(rot.next_deadline().is_none());
}

#[test]
fn advances_cyclically_after_dwell() {
    let t0 = Instant::now();
    let mut rot = Rotation::new();
    rot.sync(vec![item("a", 10), item("b", 5), item("c", 10)], t0);

    assert_eq!(rot.current().unwrap().label, "a");
    assert!(!rot.advance_if_due(t0 + Duration::from_secs(9)));
    assert!(rot.advance_if_due(t0 + Duration::from_secs(10)));
    assert_eq!(rot.current().unwrap().label, "b");

    let t1 = t0 + Duration::from_secs(10);
    assert!(rot.advance_if_due(t1 + Duration::from_secs(5)));
    assert_eq!(rot.current().unwrap().label, "c");

    let t2 = t1 + Duration::from_secs(5);
    assert!(rot.advance_if_due(t2 + Duration::from_secs(10)));
    assert_eq!(rot.current().unwrap().label, "a", "rotation wraps to the first item");
}

#[test]
fn singleton_never_advances() {
    let t0 = Instant::now();
    let mut rot = Rotation::new();
    rot.sync(vec![item("only", 1)], t0);
    assert!(!rot.advance_if_due(t0 + Duration::from_secs(3600)));
    assert_eq!(rot.current().unwrap().label, "only");
    assert!(rot.next_deadline().is_none());
}

#[test]
fn changed_set_resets_index_to_zero() {
    let t0 = Instant::now();
    let a = item("a", 5);
    let b = item("b", 5);
    let c = item("c", 5);
    let mut rot = Rotation::new();
    rot.sync(vec![a.clone(), b.clone(), c.clone()], t0);
    rot.advance_if_due(t0 + Duration::from_secs(5));
    rot.advance_if_due(t0 + Duration::from_secs(10));
    assert_eq!(rot.index(), 2);

    // "c" deactivated: the index would now be out of range.
    let t1 = t0 + Duration::from_secs(11);
    assert!(rot.sync(vec![a, b], t1));
    assert_eq!(rot.index(), 0);
    assert_eq!(rot.current().unwrap().label, "a");
    assert_eq!(rot.next_deadline(), Some(t1 + Duration::from_secs(5)));
}

#[test]
fn reordered_set_counts_as_change() {
    let t0 = Instant::now();
    let a = item("a", 5);
    let b = item("b", 5);
    let mut rot = Rotation::new();
    rot.sync(vec![a.clone(), b.clone()], t0);
    rot.advance_if_due(t0 + Duration::from_secs(5));
    assert!(rot.sync(vec![b, a], t0 + Duration::from_secs(6)));
    assert_eq!(rot.index(), 0);
    assert_eq!(rot.current().unwrap().label, "b");
}

#[test]
fn edits_keep_position_and_clock() {
    let t0 = Instant::now();
    let a = item("a", 5);
    let b = item("b", 5);
    let mut rot = Rotation::new();
    rot.sync(vec![a.clone(), b.clone()], t0);
    rot.advance_if_due(t0 + Duration::from_secs(5));
    let deadline = rot.next_deadline();

    let mut b_edited = b.clone();
    b_edited.label = "b2";
    assert!(!rot.sync(vec![a, b_edited], t0 + Duration::from_secs(7)));
    assert_eq!(rot.index(), 1);
    assert_eq!(rot.current().unwrap().label, "b2");
    assert_eq!(rot.next_deadline(), deadline);
}

#[test]
fn zero_dwell_is_floored() {
    let t0 = Instant::now();
    let mut rot = Rotation::new();
    rot.sync(vec![item("a", 0), item("b", 0)], t0);
    assert_eq!(rot.next_deadline(), Some(t0 + MIN_DWELL));
    assert_eq!(dwell_secs(-5), MIN_DWELL);
    assert_eq!(dwell_secs(30), Duration::from_secs(30));
}
