//! `rck check`: one reconciliation cycle.
//!
//! Each enabled category is fetched and reconciled on the blocking pool,
//! independently of the others. Gauges are then reported in fixed category
//! order. A failed category is logged and reported as missing, and a statsd
//! send error only marks its own category as undelivered. Either way the
//! command prints every gauge it has and exits non-zero at the end.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rck_config::CheckConfig;
use rck_inventory::{Category, FileInventorySource, InventorySnapshot, InventorySource};
use rck_metrics::{MetricsReporter, MetricsSink, NoopSink, StatsdSink};
use rck_reconcile::{AllocationPolicy, CategoryReport, ReconcileResult};
use tracing::{error, info};
use uuid::Uuid;

use super::warn_unused_keys;

/// Command-line overrides. `None` keeps the config value.
#[derive(Debug, Clone, Default)]
pub struct CheckFlags {
    pub config_paths: Vec<String>,
    pub snapshot_dir: Option<String>,
    pub region: Option<String>,
    pub statsd_host: Option<String>,
    pub statsd_port: Option<u16>,
    pub metric_prefix: Option<String>,
    pub check_ec2: Option<bool>,
    pub check_rds: Option<bool>,
    pub check_elasticache: Option<bool>,
    pub allocation_policy: Option<String>,
    pub dry_run: bool,
    pub report: bool,
}

/// Merge layered config files (if any) with command-line overrides.
pub fn resolve_config(flags: &CheckFlags) -> Result<CheckConfig> {
    let mut cfg = if flags.config_paths.is_empty() {
        CheckConfig::default()
    } else {
        let path_refs: Vec<&str> = flags.config_paths.iter().map(|s| s.as_str()).collect();
        let loaded = rck_config::load_layered_yaml(&path_refs)?;
        warn_unused_keys(&loaded)?;
        info!(config_hash = %loaded.config_hash, "config loaded");
        loaded.check_config()?
    };

    if let Some(v) = &flags.snapshot_dir {
        cfg.inventory.snapshot_dir = v.clone();
    }
    if let Some(v) = &flags.region {
        cfg.inventory.region = v.clone();
    }
    if let Some(v) = &flags.statsd_host {
        cfg.metrics.statsd_host = v.clone();
    }
    if let Some(v) = flags.statsd_port {
        cfg.metrics.statsd_port = v;
    }
    if let Some(v) = &flags.metric_prefix {
        cfg.metrics.prefix = v.clone();
    }
    if let Some(v) = flags.check_ec2 {
        cfg.categories.ec2.enabled = v;
    }
    if let Some(v) = flags.check_rds {
        cfg.categories.rds.enabled = v;
    }
    if let Some(v) = flags.check_elasticache {
        cfg.categories.elasticache.enabled = v;
    }
    if let Some(v) = &flags.allocation_policy {
        cfg.reconcile.allocation_policy = v.clone();
    }

    cfg.validate()?;
    Ok(cfg)
}

pub fn parse_policy(raw: &str) -> Result<AllocationPolicy> {
    match AllocationPolicy::parse(raw) {
        Some(p) => Ok(p),
        None => bail!(
            "invalid allocation policy '{}'. expected one of: key_order | largest_deficit_first",
            raw
        ),
    }
}

pub fn enabled_categories(cfg: &CheckConfig) -> Vec<Category> {
    Category::ALL
        .into_iter()
        .filter(|c| match c {
            Category::Ec2 => cfg.categories.ec2.enabled,
            Category::Rds => cfg.categories.rds.enabled,
            Category::ElastiCache => cfg.categories.elasticache.enabled,
        })
        .collect()
}

/// Per-category cycle outcome, `None` when the category failed.
pub struct CategoryRun {
    pub category: Category,
    pub outcome: Option<(InventorySnapshot, ReconcileResult)>,
}

/// Fetch and reconcile every category concurrently, returning outcomes in
/// the order given.
pub async fn reconcile_all(
    source: Arc<dyn InventorySource>,
    categories: &[Category],
    policy: AllocationPolicy,
) -> Vec<CategoryRun> {
    let handles: Vec<_> = categories
        .iter()
        .map(|&category| {
            let source = Arc::clone(&source);
            let handle = tokio::task::spawn_blocking(move || -> Result<_> {
                let snap = source.fetch(category)?;
                let result = snap.reconcile(policy)?;
                Ok((snap, result))
            });
            (category, handle)
        })
        .collect();

    let mut runs = Vec::with_capacity(handles.len());
    for (category, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(pair)) => Some(pair),
            Ok(Err(e)) => {
                error!(category = category.label(), error = %e, "category check failed");
                None
            }
            Err(e) => {
                error!(category = category.label(), error = %e, "category task aborted");
                None
            }
        };
        runs.push(CategoryRun { category, outcome });
    }
    runs
}

pub async fn run_check(flags: CheckFlags) -> Result<()> {
    let cfg = resolve_config(&flags)?;
    let policy = parse_policy(&cfg.reconcile.allocation_policy)?;
    let categories = enabled_categories(&cfg);

    let run_id = Uuid::new_v4();
    info!(
        %run_id,
        region = %cfg.inventory.region,
        snapshot_dir = %cfg.inventory.snapshot_dir,
        policy = policy.as_str(),
        dry_run = flags.dry_run,
        "check cycle start"
    );
    println!("run_id={}", run_id);

    let sink: Arc<dyn MetricsSink> = if flags.dry_run {
        Arc::new(NoopSink)
    } else {
        let sink = StatsdSink::connect(&cfg.metrics.statsd_host, cfg.metrics.statsd_port)
            .await
            .context("statsd sink init failed")?;
        info!(addr = sink.addr(), "statsd sink connected");
        Arc::new(sink)
    };
    let reporter = MetricsReporter::new(cfg.metrics.prefix.clone(), sink);

    let source: Arc<dyn InventorySource> = Arc::new(FileInventorySource::new(
        &cfg.inventory.snapshot_dir,
        &cfg.inventory.region,
    ));
    let runs = reconcile_all(source, &categories, policy).await;

    let outcome = report_runs(&reporter, &runs, flags.report, cfg.report.expiry_warning_days).await;
    info!(
        %run_id,
        failed = outcome.failed.len(),
        undelivered = outcome.undelivered.len(),
        "check cycle done"
    );
    outcome.into_result()
}

/// Categories that did not make it all the way through a cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// No reconciliation result.
    pub failed: Vec<&'static str>,
    /// Reconciled, but the sink rejected a gauge.
    pub undelivered: Vec<&'static str>,
}

impl CycleOutcome {
    pub fn into_result(self) -> Result<()> {
        if self.failed.is_empty() && self.undelivered.is_empty() {
            return Ok(());
        }
        bail!(
            "CHECK_INCOMPLETE: failed categories: [{}] undelivered metrics: [{}]",
            self.failed.join(", "),
            self.undelivered.join(", ")
        );
    }
}

/// Report every category in order and print its gauges. A sink error is
/// logged against its category only; later categories are still sent.
pub async fn report_runs(
    reporter: &MetricsReporter,
    runs: &[CategoryRun],
    text_report: bool,
    expiry_warning_days: i64,
) -> CycleOutcome {
    let mut outcome = CycleOutcome::default();

    for run in runs {
        let label = run.category.label();
        let result = run.outcome.as_ref().map(|(_, r)| r);
        if let Err(e) = reporter.report(label, result).await {
            error!(category = label, error = %e, "metrics delivery failed");
            outcome.undelivered.push(label);
        }

        let Some((snap, result)) = &run.outcome else {
            println!("category_failed={}", label);
            outcome.failed.push(label);
            continue;
        };

        for g in reporter.gauges(label, result) {
            println!("{}={}", g.name, g.value);
        }
        if outcome.undelivered.last() == Some(&label) {
            println!("metrics_failed={}", label);
        }
        if text_report {
            print!("{}", CategoryReport::new(result, &snap.notes, expiry_warning_days));
        }
    }

    outcome
}
