use std::collections::BTreeMap;
use std::fmt;

/// Placement key: (resource shape, placement dimension).
///
/// `shape` is the billing-relevant class (instance/node type). `dimension`
/// is category specific: an availability zone, a multi-AZ flag, or a cache
/// engine name. Ordering is shape first, then dimension, and that ordering
/// is the default wildcard allocation order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlacementKey {
    pub shape: String,
    pub dimension: String,
}

impl PlacementKey {
    pub fn new(shape: impl Into<String>, dimension: impl Into<String>) -> Self {
        Self {
            shape: shape.into(),
            dimension: dimension.into(),
        }
    }
}

impl fmt::Display for PlacementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.shape, self.dimension)
    }
}

/// Count per placement. An absent key means zero.
pub type InventoryMap = BTreeMap<PlacementKey, u64>;

/// Signed `reserved - running` per placement.
pub type DiffMap = BTreeMap<PlacementKey, i64>;

/// Unconsumed flexible reservations per resource shape.
pub type WildcardPool = BTreeMap<String, i64>;

/// Visitation order for deficits when a shape's wildcard pool is applied.
///
/// Only matters when the pool cannot cover every deficit of a shape: the
/// placements visited last are the ones left with a residual deficit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AllocationPolicy {
    /// Ascending [`PlacementKey`] order.
    #[default]
    KeyOrder,
    /// Largest deficit first; equal deficits fall back to key order.
    LargestDeficitFirst,
}

impl AllocationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationPolicy::KeyOrder => "key_order",
            AllocationPolicy::LargestDeficitFirst => "largest_deficit_first",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "key_order" | "key" => Some(AllocationPolicy::KeyOrder),
            "largest_deficit_first" | "largest_deficit" => {
                Some(AllocationPolicy::LargestDeficitFirst)
            }
            _ => None,
        }
    }
}

/// Per-category engine options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Dimension value marking a flexible (placement-agnostic) reservation.
    /// `None` means the category has no flexible reservations.
    pub wildcard: Option<String>,
    pub policy: AllocationPolicy,
}

impl ReconcileOptions {
    pub fn with_wildcard(marker: impl Into<String>) -> Self {
        Self {
            wildcard: Some(marker.into()),
            policy: AllocationPolicy::default(),
        }
    }

    pub fn policy(mut self, policy: AllocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub(crate) fn is_wildcard(&self, dimension: &str) -> bool {
        self.wildcard.as_deref() == Some(dimension)
    }
}

/// Reconciliation outcome for one category. Built fresh per call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileResult {
    pub category: String,
    /// Reservations not covering any running resource (all values > 0).
    pub unused_reservations: BTreeMap<PlacementKey, u64>,
    /// Running resources without a covering reservation (all values > 0).
    pub unreserved_instances: BTreeMap<PlacementKey, u64>,
    pub total_running: u64,
    /// Includes flexible reservations.
    pub total_reserved: u64,
}

impl ReconcileResult {
    pub fn empty(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            unused_reservations: BTreeMap::new(),
            unreserved_instances: BTreeMap::new(),
            total_running: 0,
            total_reserved: 0,
        }
    }

    pub fn unused_total(&self) -> u64 {
        self.unused_reservations.values().sum()
    }

    pub fn unreserved_total(&self) -> u64 {
        self.unreserved_instances.values().sum()
    }

    /// `true` when every running resource is covered by some reservation.
    pub fn is_fully_covered(&self) -> bool {
        self.unreserved_instances.is_empty()
    }
}

/// Which input map an offending key came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputSide {
    Running,
    Reserved,
}

impl fmt::Display for InputSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSide::Running => f.write_str("running"),
            InputSide::Reserved => f.write_str("reserved"),
        }
    }
}

/// Precondition violations detected before any diffing happens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileError {
    /// A running resource carries the wildcard dimension.
    WildcardInRunning { category: String, key: PlacementKey },
    /// A key with an empty resource shape.
    EmptyShape { category: String, side: InputSide },
    /// A count or total does not fit signed 64-bit arithmetic.
    CountOverflow { category: String },
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WildcardInRunning { category, key } => write!(
                f,
                "{category}: running inventory contains wildcard placement '{key}'"
            ),
            Self::EmptyShape { category, side } => {
                write!(f, "{category}: {side} inventory has a key with empty shape")
            }
            Self::CountOverflow { category } => {
                write!(f, "{category}: inventory counts overflow i64")
            }
        }
    }
}

impl std::error::Error for ReconcileError {}
