//! Source boundary for inventory snapshots.
//!
//! The orchestrator fetches one [`InventorySnapshot`] per category through an
//! [`InventorySource`]. A failure aborts that category only; it must never be
//! turned into an empty inventory.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::adapter::{self, AdapterError};
use crate::{Category, InventorySnapshot};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that an [`InventorySource`] implementation may return.
#[derive(Debug)]
pub enum SourceError {
    /// A response could not be read.
    Io { path: PathBuf, message: String },
    /// A response payload could not be decoded.
    Decode { path: PathBuf, message: String },
    /// A decoded response failed normalization.
    Adapter(AdapterError),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Io { path, message } => {
                write!(f, "read error at {}: {message}", path.display())
            }
            SourceError::Decode { path, message } => {
                write!(f, "decode error at {}: {message}", path.display())
            }
            SourceError::Adapter(e) => write!(f, "normalization error: {e}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Adapter(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AdapterError> for SourceError {
    fn from(e: AdapterError) -> Self {
        SourceError::Adapter(e)
    }
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Inventory provider contract.
///
/// Implementations must be object-safe so callers can hold a
/// `Arc<dyn InventorySource>`, and `Send + Sync` so categories can be fetched
/// on separate blocking tasks.
pub trait InventorySource: Send + Sync {
    /// Human-readable name identifying this source (e.g. `"file"`).
    fn name(&self) -> &'static str;

    /// Fetch running and reserved inventory for one category.
    fn fetch(&self, category: Category) -> Result<InventorySnapshot, SourceError>;
}

// ---------------------------------------------------------------------------
// File-backed source
// ---------------------------------------------------------------------------

/// Response file names, (running, reserved), per category.
pub fn response_files(category: Category) -> (&'static str, &'static str) {
    match category {
        Category::Ec2 => ("describe-instances.json", "describe-reserved-instances.json"),
        Category::Rds => (
            "describe-db-instances.json",
            "describe-reserved-db-instances.json",
        ),
        Category::ElastiCache => (
            "describe-cache-clusters.json",
            "describe-reserved-cache-nodes.json",
        ),
    }
}

/// Reads saved AWS CLI `describe-*` responses from
/// `<root>/<region>/<category>/<call>.json`.
#[derive(Debug, Clone)]
pub struct FileInventorySource {
    root: PathBuf,
    region: String,
    /// Fixed clock for expiry arithmetic; `None` uses the wall clock.
    now: Option<DateTime<Utc>>,
}

impl FileInventorySource {
    pub fn new(root: impl Into<PathBuf>, region: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            region: region.into(),
            now: None,
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(&self.region).join(category.metric_name())
    }

    fn read_pages<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SourceError> {
        let bytes = fs::read(path).map_err(|e| SourceError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);

        adapter::decode_pages(bytes).map_err(|e| SourceError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

impl InventorySource for FileInventorySource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn fetch(&self, category: Category) -> Result<InventorySnapshot, SourceError> {
        let dir = self.category_dir(category);
        let (running_file, reserved_file) = response_files(category);
        let running_path = dir.join(running_file);
        let reserved_path = dir.join(reserved_file);
        let now = self.now.unwrap_or_else(Utc::now);

        let snap = match category {
            Category::Ec2 => adapter::normalize_ec2(
                Self::read_pages(&running_path)?,
                Self::read_pages(&reserved_path)?,
                now,
            )?,
            Category::Rds => adapter::normalize_rds(
                Self::read_pages(&running_path)?,
                Self::read_pages(&reserved_path)?,
                now,
            )?,
            Category::ElastiCache => adapter::normalize_elasticache(
                Self::read_pages(&running_path)?,
                Self::read_pages(&reserved_path)?,
                now,
            )?,
        };

        info!(
            category = category.label(),
            region = %self.region,
            running_keys = snap.running.len(),
            reserved_keys = snap.reserved.len(),
            "inventory snapshot loaded"
        );
        Ok(snap)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
