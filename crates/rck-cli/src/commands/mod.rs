//! Command handler modules for rck-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod check;

use anyhow::Result;
use rck_config::{report_unused_keys, LoadedConfig, UnusedKeyPolicy};
use tracing::warn;

/// Log unused config keys. Never fails: the check command tolerates extra keys.
pub fn warn_unused_keys(loaded: &LoadedConfig) -> Result<()> {
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if report.is_clean() {
        return Ok(());
    }

    warn!(
        unused_leaf_keys = report.unused_leaf_pointers.len(),
        "CONFIG_UNUSED_KEYS"
    );
    for p in report.unused_leaf_pointers.iter().take(50) {
        warn!(unused = %p, "unused config key");
    }
    let extra = report.unused_leaf_pointers.len().saturating_sub(50);
    if extra > 0 {
        warn!(extra, "more unused config keys not shown");
    }
    Ok(())
}
