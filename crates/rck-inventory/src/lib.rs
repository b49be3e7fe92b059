//! rck-inventory
//!
//! Inventory snapshot boundary for the reconciliation engine.
//!
//! This crate owns the resource categories, the AWS `describe-*` wire
//! formats and their normalization into inventory maps, and the source
//! abstraction the orchestrator fetches snapshots through.
//! It does **not** reconcile; callers hand snapshots to `rck-reconcile`.

pub mod adapter;
pub mod source;

use anyhow::{anyhow, Result};
use rck_reconcile::{
    reconcile, AllocationPolicy, InventoryMap, PlacementNotes, ReconcileError, ReconcileOptions,
    ReconcileResult,
};

pub use adapter::AdapterError;
pub use source::{FileInventorySource, InventorySource, SourceError};

/// Dimension marking a regional (any-zone) EC2 reservation.
pub const EC2_REGIONAL_MARKER: &str = "All";

/// RDS dimension values derived from the `MultiAZ` flag.
pub const RDS_MULTI_AZ: &str = "multi-az";
pub const RDS_SINGLE_AZ: &str = "single-az";

/// Reservation-bearing service categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Ec2,
    Rds,
    ElastiCache,
}

impl Category {
    /// Fixed reporting order.
    pub const ALL: [Category; 3] = [Category::Ec2, Category::Rds, Category::ElastiCache];

    /// Operator-facing name.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Ec2 => "EC2",
            Category::Rds => "RDS",
            Category::ElastiCache => "ElastiCache",
        }
    }

    /// Lowercase name used in metric paths and snapshot directories.
    pub fn metric_name(&self) -> &'static str {
        match self {
            Category::Ec2 => "ec2",
            Category::Rds => "rds",
            Category::ElastiCache => "elasticache",
        }
    }

    /// Dimension value of a flexible reservation, if the service has them.
    pub fn wildcard_marker(&self) -> Option<&'static str> {
        match self {
            Category::Ec2 => Some(EC2_REGIONAL_MARKER),
            Category::Rds | Category::ElastiCache => None,
        }
    }

    pub fn options(&self, policy: AllocationPolicy) -> ReconcileOptions {
        ReconcileOptions {
            wildcard: self.wildcard_marker().map(str::to_string),
            policy,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ec2" => Ok(Category::Ec2),
            "rds" => Ok(Category::Rds),
            "elasticache" | "elc" => Ok(Category::ElastiCache),
            other => Err(anyhow!(
                "invalid category '{}'. expected one of: ec2 | rds | elasticache",
                other
            )),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Running and reserved inventory of one category, plus per-placement notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventorySnapshot {
    pub category: Category,
    pub running: InventoryMap,
    pub reserved: InventoryMap,
    pub notes: PlacementNotes,
}

impl InventorySnapshot {
    pub fn empty(category: Category) -> Self {
        Self {
            category,
            running: InventoryMap::new(),
            reserved: InventoryMap::new(),
            notes: PlacementNotes::default(),
        }
    }

    /// Run the engine over this snapshot with the category's wildcard rule.
    pub fn reconcile(&self, policy: AllocationPolicy) -> Result<ReconcileResult, ReconcileError> {
        reconcile(
            self.category.label(),
            &self.running,
            &self.reserved,
            &self.category.options(policy),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rck_reconcile::PlacementKey;

    #[test]
    fn category_names_are_stable() {
        assert_eq!(Category::Ec2.label(), "EC2");
        assert_eq!(Category::ElastiCache.metric_name(), "elasticache");
        assert_eq!(Category::Rds.to_string(), "RDS");
    }

    #[test]
    fn only_ec2_has_a_wildcard() {
        assert_eq!(Category::Ec2.wildcard_marker(), Some("All"));
        assert_eq!(Category::Rds.wildcard_marker(), None);
        assert_eq!(Category::ElastiCache.wildcard_marker(), None);
    }

    #[test]
    fn parse_accepts_short_and_mixed_case() {
        assert_eq!(Category::parse("EC2").unwrap(), Category::Ec2);
        assert_eq!(Category::parse(" elc ").unwrap(), Category::ElastiCache);
        assert!(Category::parse("lambda").is_err());
    }

    #[test]
    fn snapshot_reconcile_applies_category_wildcard() {
        let mut snap = InventorySnapshot::empty(Category::Ec2);
        snap.running.insert(PlacementKey::new("m5.large", "us-east-1a"), 2);
        snap.reserved.insert(PlacementKey::new("m5.large", "All"), 2);

        let r = snap.reconcile(AllocationPolicy::KeyOrder).unwrap();
        assert_eq!(r.category, "EC2");
        assert!(r.unreserved_instances.is_empty());
        assert!(r.unused_reservations.is_empty());
    }
}
