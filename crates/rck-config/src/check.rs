//! Typed view of the keys `rck check` consumes.
//!
//! Every field has a default, so an empty config is a valid config. Keys
//! listed here must stay in sync with `CONSUMED_POINTERS`.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    pub prefix: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            statsd_host: "127.0.0.1".to_string(),
            statsd_port: 8125,
            prefix: "aws".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub region: String,
    /// Root of saved `describe-*` responses: `<snapshot_dir>/<region>/<category>/`.
    pub snapshot_dir: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            snapshot_dir: "snapshots".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryToggle {
    pub enabled: bool,
}

impl Default for CategoryToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoriesConfig {
    pub ec2: CategoryToggle,
    pub rds: CategoryToggle,
    pub elasticache: CategoryToggle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// `key_order` | `largest_deficit_first`
    pub allocation_policy: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            allocation_policy: "key_order".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub expiry_warning_days: i64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            expiry_warning_days: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub metrics: MetricsConfig,
    pub inventory: InventoryConfig,
    pub categories: CategoriesConfig,
    pub reconcile: ReconcileConfig,
    pub report: ReportConfig,
}

impl CheckConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: CheckConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: config does not match the check schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics.statsd_host.trim().is_empty() {
            bail!("CONFIG_INVALID: /metrics/statsd_host must not be empty");
        }
        if self.metrics.statsd_port == 0 {
            bail!("CONFIG_INVALID: /metrics/statsd_port must be non-zero");
        }
        if self.inventory.region.trim().is_empty() {
            bail!("CONFIG_INVALID: /inventory/region must not be empty");
        }
        if self.report.expiry_warning_days < 0 {
            bail!(
                "CONFIG_INVALID: /report/expiry_warning_days must be >= 0 (got {})",
                self.report.expiry_warning_days
            );
        }
        Ok(())
    }
}
