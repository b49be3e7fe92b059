//! Test fixtures shared by scenario tests: inventory builders, an in-memory
//! inventory source, a recording metrics sink, and on-disk snapshot trees.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rck_inventory::source::response_files;
use rck_inventory::{Category, FileInventorySource, InventorySnapshot, InventorySource, SourceError};
use rck_metrics::{Gauge, MetricsReporter, MetricsSink, SinkError};
use rck_reconcile::{AllocationPolicy, InventoryMap, PlacementKey};
use tracing::warn;

/// `[("m5.large", "us-east-1a", 2), ...]` -> inventory map. Repeated keys add up.
pub fn inv(entries: &[(&str, &str, u64)]) -> InventoryMap {
    let mut out = InventoryMap::new();
    for (shape, dimension, count) in entries {
        *out.entry(PlacementKey::new(*shape, *dimension)).or_insert(0) += count;
    }
    out
}

pub fn snapshot(
    category: Category,
    running: &[(&str, &str, u64)],
    reserved: &[(&str, &str, u64)],
) -> InventorySnapshot {
    let mut snap = InventorySnapshot::empty(category);
    snap.running = inv(running);
    snap.reserved = inv(reserved);
    snap
}

/// Fixed clock for expiry arithmetic in fixtures: 2026-01-01T00:00:00Z.
pub fn fixture_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

enum Canned {
    Snapshot(InventorySnapshot),
    Failure(String),
}

/// Serves canned snapshots; unknown categories fail like a missing response.
#[derive(Default)]
pub struct StaticSource {
    canned: BTreeMap<Category, Canned>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, snap: InventorySnapshot) -> Self {
        self.canned.insert(snap.category, Canned::Snapshot(snap));
        self
    }

    pub fn failing(mut self, category: Category, message: impl Into<String>) -> Self {
        self.canned.insert(category, Canned::Failure(message.into()));
        self
    }
}

impl InventorySource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    fn fetch(&self, category: Category) -> Result<InventorySnapshot, SourceError> {
        match self.canned.get(&category) {
            Some(Canned::Snapshot(snap)) => Ok(snap.clone()),
            Some(Canned::Failure(message)) => Err(SourceError::Io {
                path: PathBuf::from(category.metric_name()),
                message: message.clone(),
            }),
            None => Err(SourceError::Io {
                path: PathBuf::from(category.metric_name()),
                message: "no canned snapshot".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Recording sink
// ---------------------------------------------------------------------------

/// Keeps every gauge it receives, in order.
#[derive(Default)]
pub struct RecordingSink {
    gauges: Mutex<Vec<Gauge>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Gauge> {
        match self.gauges.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Last value recorded under `name`.
    pub fn value(&self, name: &str) -> Option<u64> {
        self.recorded()
            .into_iter()
            .rev()
            .find(|g| g.name == name)
            .map(|g| g.value)
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn gauge(&self, name: &str, value: u64) -> Result<(), SinkError> {
        let mut g = self
            .gauges
            .lock()
            .map_err(|_| SinkError::SendFailed("recording sink poisoned".to_string()))?;
        g.push(Gauge {
            name: name.to_string(),
            value,
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// On-disk snapshot trees
// ---------------------------------------------------------------------------

/// Temporary `<root>/<region>/<category>/` tree of `describe-*` responses.
pub struct SnapshotTree {
    dir: tempfile::TempDir,
    region: String,
}

impl SnapshotTree {
    pub fn new(region: impl Into<String>) -> Result<Self> {
        let dir = tempfile::tempdir().context("create snapshot tempdir")?;
        Ok(Self {
            dir,
            region: region.into(),
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write the running and reserved responses for `category`.
    pub fn write(&self, category: Category, running_json: &str, reserved_json: &str) -> Result<()> {
        let dir = self.root().join(&self.region).join(category.metric_name());
        fs::create_dir_all(&dir).with_context(|| format!("mkdir {}", dir.display()))?;

        let (running_file, reserved_file) = response_files(category);
        fs::write(dir.join(running_file), running_json)
            .with_context(|| format!("write {running_file}"))?;
        fs::write(dir.join(reserved_file), reserved_json)
            .with_context(|| format!("write {reserved_file}"))?;
        Ok(())
    }

    /// File source over this tree with the fixture clock.
    pub fn source(&self) -> FileInventorySource {
        FileInventorySource::new(self.root(), &self.region).at(fixture_now())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// fetch -> reconcile -> report for one category. A fetch or reconcile
/// failure is reported as a missing result, as the CLI does.
pub async fn check_category(
    source: &dyn InventorySource,
    category: Category,
    policy: AllocationPolicy,
    reporter: &MetricsReporter,
) -> Result<Vec<Gauge>> {
    let outcome = source
        .fetch(category)
        .map_err(anyhow::Error::from)
        .and_then(|snap| snap.reconcile(policy).map_err(anyhow::Error::from));
    let result = match outcome {
        Ok(r) => Some(r),
        Err(e) => {
            warn!(category = category.label(), error = %e, "category check failed");
            None
        }
    };
    let gauges = reporter.report(category.label(), result.as_ref()).await?;
    Ok(gauges)
}
