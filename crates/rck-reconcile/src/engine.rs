use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    AllocationPolicy, DiffMap, InputSide, InventoryMap, PlacementKey, ReconcileError,
    ReconcileOptions, ReconcileResult, WildcardPool,
};

fn to_signed(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Reject inputs the engine cannot diff meaningfully, and compute both totals.
///
/// Totals are taken from the untouched inputs so allocation can only change
/// attribution, never the reserved count.
fn validate_and_total(
    category: &str,
    running: &InventoryMap,
    reserved: &InventoryMap,
    opts: &ReconcileOptions,
) -> Result<(u64, u64), ReconcileError> {
    let overflow = || ReconcileError::CountOverflow {
        category: category.to_string(),
    };

    let mut total_running: u64 = 0;
    for (key, count) in running {
        if key.shape.trim().is_empty() {
            return Err(ReconcileError::EmptyShape {
                category: category.to_string(),
                side: InputSide::Running,
            });
        }
        if opts.is_wildcard(&key.dimension) {
            return Err(ReconcileError::WildcardInRunning {
                category: category.to_string(),
                key: key.clone(),
            });
        }
        total_running = total_running.checked_add(*count).ok_or_else(overflow)?;
    }

    let mut total_reserved: u64 = 0;
    for (key, count) in reserved {
        if key.shape.trim().is_empty() {
            return Err(ReconcileError::EmptyShape {
                category: category.to_string(),
                side: InputSide::Reserved,
            });
        }
        total_reserved = total_reserved.checked_add(*count).ok_or_else(overflow)?;
    }

    if i64::try_from(total_running).is_err() || i64::try_from(total_reserved).is_err() {
        return Err(overflow());
    }

    Ok((total_running, total_reserved))
}

/// Build the per-placement diff (`reserved - running`) and the wildcard pool.
///
/// Reserved keys whose dimension equals `wildcard` go to the pool (summed per
/// shape) instead of the diff. Running keys never carry the wildcard.
pub fn build_diff(
    running: &InventoryMap,
    reserved: &InventoryMap,
    wildcard: Option<&str>,
) -> (DiffMap, WildcardPool) {
    let mut diff: DiffMap = BTreeMap::new();
    let mut pool: WildcardPool = BTreeMap::new();

    for (key, count) in reserved {
        if wildcard == Some(key.dimension.as_str()) {
            *pool.entry(key.shape.clone()).or_insert(0) += to_signed(*count);
            continue;
        }
        let used = running.get(key).copied().unwrap_or(0);
        diff.insert(key.clone(), to_signed(*count) - to_signed(used));
    }

    for (key, count) in running {
        if wildcard == Some(key.dimension.as_str()) || diff.contains_key(key) {
            continue;
        }
        diff.insert(key.clone(), -to_signed(*count));
    }

    (diff, pool)
}

/// Deficit keys of `shape`, in the order the policy visits them.
fn deficits_for_shape(
    diff: &DiffMap,
    shape: &str,
    wildcard: &str,
    policy: AllocationPolicy,
) -> Vec<PlacementKey> {
    let mut keys: Vec<(PlacementKey, i64)> = diff
        .iter()
        .filter(|(k, v)| k.shape == shape && k.dimension != wildcard && **v < 0)
        .map(|(k, v)| (k.clone(), *v))
        .collect();

    // `diff` iterates in key order already; sort_by is stable.
    if policy == AllocationPolicy::LargestDeficitFirst {
        keys.sort_by(|a, b| a.1.cmp(&b.1));
    }

    keys.into_iter().map(|(k, _)| k).collect()
}

/// Apply each shape's flexible reservations to that shape's deficits.
///
/// Every shape present in `pool` ends with exactly one `(shape, wildcard)`
/// entry in `diff` holding the unconsumed remainder (possibly zero).
pub fn allocate_wildcards(
    diff: &mut DiffMap,
    pool: WildcardPool,
    wildcard: &str,
    policy: AllocationPolicy,
) {
    for (shape, mut available) in pool {
        if available > 0 {
            for key in deficits_for_shape(diff, &shape, wildcard, policy) {
                if available == 0 {
                    break;
                }
                if let Some(value) = diff.get_mut(&key) {
                    let take = (-*value).min(available);
                    *value += take;
                    available -= take;
                    debug!(placement = %key, covered = take, "wildcard reservations applied");
                }
            }
        }

        diff.insert(PlacementKey::new(shape, wildcard), available);
    }
}

/// Split a diff into (unused reservations, unreserved instances).
pub fn categorize(
    diff: &DiffMap,
) -> (
    BTreeMap<PlacementKey, u64>,
    BTreeMap<PlacementKey, u64>,
) {
    let mut unused = BTreeMap::new();
    let mut unreserved = BTreeMap::new();

    for (key, value) in diff {
        if *value > 0 {
            unused.insert(key.clone(), value.unsigned_abs());
        } else if *value < 0 {
            unreserved.insert(key.clone(), value.unsigned_abs());
        }
    }

    (unused, unreserved)
}

/// Reconcile one category's running inventory against its reservations.
///
/// Pure and synchronous: inputs are borrowed and never modified, and no state
/// survives the call.
pub fn reconcile(
    category: &str,
    running: &InventoryMap,
    reserved: &InventoryMap,
    opts: &ReconcileOptions,
) -> Result<ReconcileResult, ReconcileError> {
    let (total_running, total_reserved) = validate_and_total(category, running, reserved, opts)?;

    let wildcard = opts.wildcard.as_deref();
    let (mut diff, pool) = build_diff(running, reserved, wildcard);

    if let Some(marker) = wildcard {
        allocate_wildcards(&mut diff, pool, marker, opts.policy);
    }

    let (unused_reservations, unreserved_instances) = categorize(&diff);

    debug!(
        category,
        placements = diff.len(),
        unused = unused_reservations.len(),
        unreserved = unreserved_instances.len(),
        "reconciled"
    );

    Ok(ReconcileResult {
        category: category.to_string(),
        unused_reservations,
        unreserved_instances,
        total_running,
        total_reserved,
    })
}
