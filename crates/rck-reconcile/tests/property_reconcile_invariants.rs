//! Property tests: reconciliation invariants over arbitrary inventories.
//!
//! 1. Conservation: unused - unreserved == reserved - running, overall and
//!    per shape across wildcard allocation.
//! 2. Unused and unreserved never share a key; every value is positive.
//! 3. An empty pool leaves concrete deficits unchanged.
//! 4. A pool at least as large as a shape's deficits clears them and keeps
//!    `pool - deficit` on the wildcard key.
//! 5. Allocation policy changes attribution only, never the totals.

use std::collections::BTreeMap;

use proptest::prelude::*;
use rck_reconcile::*;

const WILDCARD: &str = "All";

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_shape() -> impl Strategy<Value = String> {
    prop_oneof![Just("t1"), Just("t2"), Just("m5.large")].prop_map(str::to_string)
}

fn arb_zone() -> impl Strategy<Value = String> {
    prop_oneof![Just("az1"), Just("az2"), Just("az3")].prop_map(str::to_string)
}

fn arb_running() -> impl Strategy<Value = InventoryMap> {
    prop::collection::btree_map(
        (arb_shape(), arb_zone()).prop_map(|(s, d)| PlacementKey::new(s, d)),
        0u64..20,
        0..8,
    )
}

fn arb_reserved() -> impl Strategy<Value = InventoryMap> {
    let dim = prop_oneof![3 => arb_zone(), 1 => Just(WILDCARD.to_string())];
    prop::collection::btree_map(
        (arb_shape(), dim).prop_map(|(s, d)| PlacementKey::new(s, d)),
        0u64..20,
        0..8,
    )
}

fn arb_policy() -> impl Strategy<Value = AllocationPolicy> {
    prop_oneof![
        Just(AllocationPolicy::KeyOrder),
        Just(AllocationPolicy::LargestDeficitFirst),
    ]
}

fn opts(policy: AllocationPolicy) -> ReconcileOptions {
    ReconcileOptions::with_wildcard(WILDCARD).policy(policy)
}

/// Sum of concrete deficits of `shape` before any wildcard is applied.
fn shape_deficit(running: &InventoryMap, reserved: &InventoryMap, shape: &str) -> u64 {
    let (diff, _) = build_diff(running, reserved, Some(WILDCARD));
    diff.iter()
        .filter(|(k, v)| k.shape == shape && **v < 0)
        .map(|(_, v)| v.unsigned_abs())
        .sum()
}

/// Sum of diff values per shape, wildcard entry included.
fn sums_by_shape(diff: &DiffMap) -> BTreeMap<String, i64> {
    let mut out = BTreeMap::new();
    for (key, value) in diff {
        *out.entry(key.shape.clone()).or_insert(0) += *value;
    }
    out
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn conservation_holds(
        running in arb_running(),
        reserved in arb_reserved(),
        policy in arb_policy(),
    ) {
        let r = reconcile("EC2", &running, &reserved, &opts(policy)).unwrap();

        let lhs = r.unused_total() as i128 - r.unreserved_total() as i128;
        let rhs = r.total_reserved as i128 - r.total_running as i128;
        prop_assert_eq!(lhs, rhs);
        prop_assert_eq!(r.total_running, running.values().sum::<u64>());
        prop_assert_eq!(r.total_reserved, reserved.values().sum::<u64>());
    }

    #[test]
    fn allocation_conserves_each_shape(
        running in arb_running(),
        reserved in arb_reserved(),
        policy in arb_policy(),
    ) {
        let (mut diff, pool) = build_diff(&running, &reserved, Some(WILDCARD));

        let mut before = sums_by_shape(&diff);
        for (shape, available) in &pool {
            *before.entry(shape.clone()).or_insert(0) += *available;
        }

        allocate_wildcards(&mut diff, pool.clone(), WILDCARD, policy);
        let after = sums_by_shape(&diff);

        prop_assert_eq!(&after, &before);
        for (shape, available) in &pool {
            let left = diff[&PlacementKey::new(shape.as_str(), WILDCARD)];
            prop_assert!(left >= 0 && left <= *available);
        }
    }

    #[test]
    fn outputs_are_positive_and_disjoint(
        running in arb_running(),
        reserved in arb_reserved(),
        policy in arb_policy(),
    ) {
        let r = reconcile("EC2", &running, &reserved, &opts(policy)).unwrap();

        for (key, v) in &r.unused_reservations {
            prop_assert!(*v > 0);
            prop_assert!(!r.unreserved_instances.contains_key(key));
        }
        for (key, v) in &r.unreserved_instances {
            prop_assert!(*v > 0);
            prop_assert!(key.dimension != WILDCARD);
        }
    }

    #[test]
    fn empty_pool_leaves_deficits_unchanged(
        running in arb_running(),
        reserved in arb_reserved(),
        policy in arb_policy(),
    ) {
        let concrete: InventoryMap = reserved
            .iter()
            .filter(|(k, _)| k.dimension != WILDCARD)
            .map(|(k, v)| (k.clone(), *v))
            .collect();

        let (diff, pool) = build_diff(&running, &concrete, Some(WILDCARD));
        prop_assert!(pool.is_empty());

        let r = reconcile("EC2", &running, &concrete, &opts(policy)).unwrap();
        let (_, expected_unreserved) = categorize(&diff);
        prop_assert_eq!(r.unreserved_instances, expected_unreserved);
    }

    #[test]
    fn sufficient_pool_clears_shape_deficits(
        running in arb_running(),
        reserved in arb_reserved(),
        extra in 0u64..5,
        policy in arb_policy(),
    ) {
        let mut reserved = reserved;
        let shape = "t1";
        let deficit = shape_deficit(&running, &reserved, shape);
        let pool = deficit + extra;
        reserved.insert(PlacementKey::new(shape, WILDCARD), pool);

        let r = reconcile("EC2", &running, &reserved, &opts(policy)).unwrap();

        prop_assert!(r.unreserved_instances.keys().all(|k| k.shape != shape));
        let leftover = r
            .unused_reservations
            .get(&PlacementKey::new(shape, WILDCARD))
            .copied()
            .unwrap_or(0);
        prop_assert_eq!(leftover, pool - deficit);
    }

    #[test]
    fn policy_changes_attribution_only(
        running in arb_running(),
        reserved in arb_reserved(),
    ) {
        let a = reconcile("EC2", &running, &reserved, &opts(AllocationPolicy::KeyOrder)).unwrap();
        let b = reconcile(
            "EC2",
            &running,
            &reserved,
            &opts(AllocationPolicy::LargestDeficitFirst),
        )
        .unwrap();

        prop_assert_eq!(a.unused_total(), b.unused_total());
        prop_assert_eq!(a.unreserved_total(), b.unreserved_total());
        prop_assert_eq!(a.unused_reservations, b.unused_reservations);
    }
}
