//! Snapshot adapter: deserialize AWS `describe-*` responses and normalize
//! them into [`InventorySnapshot`]s.
//!
//! # Purpose
//! The AWS APIs return running resources and reservations in per-service
//! schemas. This module mirrors those responses as *raw* structs (PascalCase,
//! as emitted by the AWS CLI) and provides one normalization function per
//! category that keys counts by [`PlacementKey`].
//!
//! # Design constraints
//! - Pure, deterministic conversion. No IO, no clock: callers inject `now`
//!   for expiry arithmetic.
//! - Malformed entries are surfaced as [`AdapterError`]; a category with bad
//!   input is aborted, never treated as "zero resources".
//! - Unknown fields are ignored so API additions don't break decoding.

use chrono::{DateTime, TimeDelta, Utc};
use rck_reconcile::PlacementKey;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{Category, InventorySnapshot, EC2_REGIONAL_MARKER, RDS_MULTI_AZ, RDS_SINGLE_AZ};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// An instance/node type field was empty.
    MissingShape { category: Category, id: String },
    /// A zonal reservation without an availability zone.
    MissingZone { instance_type: String },
    /// A reservation count below zero.
    NegativeCount {
        category: Category,
        shape: String,
        count: i64,
    },
    /// `StartTime + Duration` is not a representable timestamp.
    InvalidDuration {
        category: Category,
        shape: String,
        seconds: i64,
    },
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingShape { category, id } => {
                write!(f, "{category} resource '{id}' has empty instance type")
            }
            Self::MissingZone { instance_type } => write!(
                f,
                "EC2 zonal reservation for '{instance_type}' has no availability zone"
            ),
            Self::NegativeCount {
                category,
                shape,
                count,
            } => write!(f, "{category} reservation '{shape}' has negative count {count}"),
            Self::InvalidDuration {
                category,
                shape,
                seconds,
            } => write!(
                f,
                "{category} reservation '{shape}' has out-of-range duration {seconds}s"
            ),
        }
    }
}

impl std::error::Error for AdapterError {}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// A response file holds either one response object or a list of pages.
///
/// The first token picks the shape, so a malformed page keeps serde's
/// field and position in the error.
pub fn decode_pages<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<Vec<T>> {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'[') => serde_json::from_slice(bytes),
        _ => serde_json::from_slice::<T>(bytes).map(|page| vec![page]),
    }
}

// ---------------------------------------------------------------------------
// EC2 wire structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeInstancesPage {
    #[serde(default)]
    pub reservations: Vec<RawEc2Reservation>,
}

/// EC2 launch group (unrelated to reserved instances, despite the name).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawEc2Reservation {
    #[serde(default)]
    pub instances: Vec<RawEc2Instance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawEc2Instance {
    pub instance_id: String,
    pub instance_type: String,
    pub placement: RawPlacement,
    /// Absent when the caller already filtered to running instances.
    pub state: Option<RawInstanceState>,
    pub spot_instance_request_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<RawTag>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawPlacement {
    pub availability_zone: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawInstanceState {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawTag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeReservedInstancesPage {
    #[serde(default)]
    pub reserved_instances: Vec<RawReservedInstance>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawReservedInstance {
    pub instance_type: String,
    pub availability_zone: Option<String>,
    /// `"Availability Zone"` or `"Region"`.
    pub scope: Option<String>,
    pub instance_count: i64,
    pub state: String,
    pub end: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RDS wire structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescribeDbInstancesPage {
    #[serde(rename = "DBInstances", default)]
    pub db_instances: Vec<RawDbInstance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDbInstance {
    #[serde(rename = "DBInstanceIdentifier")]
    pub identifier: String,
    #[serde(rename = "DBInstanceClass")]
    pub instance_class: String,
    #[serde(rename = "MultiAZ")]
    pub multi_az: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescribeReservedDbInstancesPage {
    #[serde(rename = "ReservedDBInstances", default)]
    pub reserved_db_instances: Vec<RawReservedDbInstance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawReservedDbInstance {
    #[serde(rename = "DBInstanceClass")]
    pub instance_class: String,
    #[serde(rename = "MultiAZ")]
    pub multi_az: bool,
    #[serde(rename = "DBInstanceCount")]
    pub count: i64,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "StartTime")]
    pub start_time: DateTime<Utc>,
    /// Term length in seconds.
    #[serde(rename = "Duration")]
    pub duration: i64,
}

// ---------------------------------------------------------------------------
// ElastiCache wire structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeCacheClustersPage {
    #[serde(default)]
    pub cache_clusters: Vec<RawCacheCluster>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawCacheCluster {
    pub cache_cluster_id: String,
    pub cache_node_type: String,
    pub engine: String,
    pub cache_cluster_status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeReservedCacheNodesPage {
    #[serde(default)]
    pub reserved_cache_nodes: Vec<RawReservedCacheNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawReservedCacheNode {
    pub cache_node_type: String,
    /// Engine the reservation applies to (e.g. `"redis"`).
    pub product_description: String,
    pub cache_node_count: i64,
    pub state: String,
    pub start_time: DateTime<Utc>,
    pub duration: i64,
}

// ---------------------------------------------------------------------------
// Normalization helpers
// ---------------------------------------------------------------------------

/// Whole days from `now` until `expiry`, truncated toward zero.
pub fn days_until(expiry: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expiry - now).num_days()
}

fn expiry_from_term(
    category: Category,
    shape: &str,
    start: DateTime<Utc>,
    seconds: i64,
) -> Result<DateTime<Utc>, AdapterError> {
    TimeDelta::try_seconds(seconds)
        .and_then(|d| start.checked_add_signed(d))
        .ok_or_else(|| AdapterError::InvalidDuration {
            category,
            shape: shape.to_string(),
            seconds,
        })
}

fn require_shape(category: Category, shape: &str, id: &str) -> Result<String, AdapterError> {
    let shape = shape.trim();
    if shape.is_empty() {
        return Err(AdapterError::MissingShape {
            category,
            id: id.to_string(),
        });
    }
    Ok(shape.to_string())
}

fn require_count(category: Category, shape: &str, count: i64) -> Result<u64, AdapterError> {
    u64::try_from(count).map_err(|_| AdapterError::NegativeCount {
        category,
        shape: shape.to_string(),
        count,
    })
}

fn is_active(state: &str) -> bool {
    state.trim().eq_ignore_ascii_case("active")
}

fn add_running(snap: &mut InventorySnapshot, key: PlacementKey, id: String) {
    snap.notes.add_instance(&key, id);
    *snap.running.entry(key).or_insert(0) += 1;
}

fn add_reserved(snap: &mut InventorySnapshot, key: PlacementKey, count: u64, days: i64) {
    snap.notes.add_expiry(&key, days);
    *snap.reserved.entry(key).or_insert(0) += count;
}

/// `Name` tag when present and non-empty, else the instance id.
fn ec2_display_name(inst: &RawEc2Instance) -> String {
    inst.tags
        .iter()
        .find(|t| t.key == "Name" && !t.value.trim().is_empty())
        .map(|t| t.value.clone())
        .unwrap_or_else(|| inst.instance_id.clone())
}

fn ec2_reservation_dimension(ri: &RawReservedInstance) -> Result<String, AdapterError> {
    let zone = ri
        .availability_zone
        .as_deref()
        .map(str::trim)
        .filter(|z| !z.is_empty());

    match (ri.scope.as_deref(), zone) {
        (Some("Availability Zone"), Some(z)) => Ok(z.to_string()),
        (Some("Availability Zone"), None) => Err(AdapterError::MissingZone {
            instance_type: ri.instance_type.clone(),
        }),
        (None, Some(z)) => Ok(z.to_string()),
        _ => Ok(EC2_REGIONAL_MARKER.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// EC2: running on-demand instances by (type, zone); active reservations by
/// (type, zone) for zonal scope or (type, `All`) for regional scope.
///
/// Spot instances are skipped: reservations never apply to them.
pub fn normalize_ec2(
    instances: Vec<DescribeInstancesPage>,
    reserved: Vec<DescribeReservedInstancesPage>,
    now: DateTime<Utc>,
) -> Result<InventorySnapshot, AdapterError> {
    let category = Category::Ec2;
    let mut snap = InventorySnapshot::empty(category);

    for inst in instances
        .into_iter()
        .flat_map(|p| p.reservations)
        .flat_map(|r| r.instances)
    {
        if inst.spot_instance_request_id.is_some() {
            continue;
        }
        if let Some(state) = &inst.state {
            if !state.name.eq_ignore_ascii_case("running") {
                continue;
            }
        }
        let shape = require_shape(category, &inst.instance_type, &inst.instance_id)?;
        let zone = inst.placement.availability_zone.trim().to_string();
        let name = ec2_display_name(&inst);
        add_running(&mut snap, PlacementKey::new(shape, zone), name);
    }

    for ri in reserved.into_iter().flat_map(|p| p.reserved_instances) {
        if !is_active(&ri.state) {
            continue;
        }
        let shape = require_shape(category, &ri.instance_type, "reserved-instance")?;
        let count = require_count(category, &shape, ri.instance_count)?;
        let dimension = ec2_reservation_dimension(&ri)?;
        let days = days_until(ri.end, now);
        add_reserved(&mut snap, PlacementKey::new(shape, dimension), count, days);
    }

    Ok(snap)
}

/// RDS: every DB instance by (class, multi-AZ flag); active reservations by
/// the same key, expiring `Duration` seconds after `StartTime`.
pub fn normalize_rds(
    instances: Vec<DescribeDbInstancesPage>,
    reserved: Vec<DescribeReservedDbInstancesPage>,
    now: DateTime<Utc>,
) -> Result<InventorySnapshot, AdapterError> {
    let category = Category::Rds;
    let mut snap = InventorySnapshot::empty(category);

    for db in instances.into_iter().flat_map(|p| p.db_instances) {
        let shape = require_shape(category, &db.instance_class, &db.identifier)?;
        let key = PlacementKey::new(shape, rds_dimension(db.multi_az));
        add_running(&mut snap, key, db.identifier);
    }

    for ri in reserved.into_iter().flat_map(|p| p.reserved_db_instances) {
        if !is_active(&ri.state) {
            continue;
        }
        let shape = require_shape(category, &ri.instance_class, "reserved-db-instance")?;
        let count = require_count(category, &shape, ri.count)?;
        let expiry = expiry_from_term(category, &shape, ri.start_time, ri.duration)?;
        let key = PlacementKey::new(shape, rds_dimension(ri.multi_az));
        add_reserved(&mut snap, key, count, days_until(expiry, now));
    }

    Ok(snap)
}

fn rds_dimension(multi_az: bool) -> &'static str {
    if multi_az {
        RDS_MULTI_AZ
    } else {
        RDS_SINGLE_AZ
    }
}

/// ElastiCache: available clusters by (node type, engine), one per cluster;
/// active reserved nodes by (node type, product description).
pub fn normalize_elasticache(
    clusters: Vec<DescribeCacheClustersPage>,
    reserved: Vec<DescribeReservedCacheNodesPage>,
    now: DateTime<Utc>,
) -> Result<InventorySnapshot, AdapterError> {
    let category = Category::ElastiCache;
    let mut snap = InventorySnapshot::empty(category);

    for cluster in clusters.into_iter().flat_map(|p| p.cache_clusters) {
        if !cluster.cache_cluster_status.eq_ignore_ascii_case("available") {
            continue;
        }
        let shape = require_shape(category, &cluster.cache_node_type, &cluster.cache_cluster_id)?;
        let key = PlacementKey::new(shape, cluster.engine.trim());
        add_running(&mut snap, key, cluster.cache_cluster_id);
    }

    for node in reserved.into_iter().flat_map(|p| p.reserved_cache_nodes) {
        if !is_active(&node.state) {
            continue;
        }
        let shape = require_shape(category, &node.cache_node_type, "reserved-cache-node")?;
        let count = require_count(category, &shape, node.cache_node_count)?;
        let expiry = expiry_from_term(category, &shape, node.start_time, node.duration)?;
        let key = PlacementKey::new(shape, node.product_description.trim());
        add_reserved(&mut snap, key, count, days_until(expiry, now));
    }

    Ok(snap)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
