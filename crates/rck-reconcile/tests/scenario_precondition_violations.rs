//! Scenario: malformed inventories fail fast and name the category.

use rck_reconcile::*;

fn inv(entries: &[(&str, &str, u64)]) -> InventoryMap {
    entries
        .iter()
        .map(|(s, d, n)| (PlacementKey::new(*s, *d), *n))
        .collect()
}

#[test]
fn wildcard_in_running_is_rejected() {
    let running = inv(&[("t1", "All", 1)]);
    let err = reconcile(
        "EC2",
        &running,
        &InventoryMap::new(),
        &ReconcileOptions::with_wildcard("All"),
    )
    .unwrap_err();

    assert_eq!(
        err,
        ReconcileError::WildcardInRunning {
            category: "EC2".to_string(),
            key: PlacementKey::new("t1", "All"),
        }
    );
    assert_eq!(
        err.to_string(),
        "EC2: running inventory contains wildcard placement 't1 All'"
    );
}

#[test]
fn marker_is_an_ordinary_dimension_when_category_has_no_wildcard() {
    let running = inv(&[("t1", "All", 1)]);
    let r = reconcile("RDS", &running, &InventoryMap::new(), &ReconcileOptions::default())
        .unwrap();
    assert_eq!(r.unreserved_instances, running);
}

#[test]
fn empty_shape_is_rejected_on_either_side() {
    let bad = inv(&[("", "az1", 1)]);

    let err = reconcile("EC2", &bad, &InventoryMap::new(), &ReconcileOptions::default())
        .unwrap_err();
    assert_eq!(
        err,
        ReconcileError::EmptyShape {
            category: "EC2".to_string(),
            side: InputSide::Running,
        }
    );

    let err = reconcile("EC2", &InventoryMap::new(), &bad, &ReconcileOptions::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "EC2: reserved inventory has a key with empty shape");
}

#[test]
fn count_beyond_i64_is_rejected() {
    let reserved = inv(&[("t1", "az1", u64::MAX)]);
    let err = reconcile(
        "ElastiCache",
        &InventoryMap::new(),
        &reserved,
        &ReconcileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, ReconcileError::CountOverflow { .. }));
}

#[test]
fn allocation_policy_parses_config_spellings() {
    assert_eq!(AllocationPolicy::parse("key_order"), Some(AllocationPolicy::KeyOrder));
    assert_eq!(
        AllocationPolicy::parse("Largest-Deficit-First"),
        Some(AllocationPolicy::LargestDeficitFirst)
    );
    assert_eq!(AllocationPolicy::parse("random"), None);
    assert_eq!(AllocationPolicy::default().as_str(), "key_order");
}
