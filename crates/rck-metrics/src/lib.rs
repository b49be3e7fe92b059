//! rck-metrics
//!
//! Forwards reconciliation outcomes to a metrics sink as four gauges per
//! category:
//!
//! - `{prefix}.{category}.unused_reservations`
//! - `{prefix}.{category}.unreserved_instances`
//! - `{prefix}.{category}.qty_running_instances`
//! - `{prefix}.{category}.qty_reserved_instances`
//!
//! A category whose reconciliation did not produce a result is logged and
//! skipped; it never fails the other categories.

pub mod sink;

use std::sync::Arc;

use rck_reconcile::ReconcileResult;
use tracing::{info, warn};

pub use sink::{MetricsSink, NoopSink, SinkError, StatsdSink};

/// One emitted gauge value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gauge {
    pub name: String,
    pub value: u64,
}

/// The four scalar aggregates reported per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySummary {
    pub unused_reservations: u64,
    pub unreserved_instances: u64,
    pub qty_running_instances: u64,
    pub qty_reserved_instances: u64,
}

impl CategorySummary {
    pub fn from_result(result: &ReconcileResult) -> Self {
        Self {
            unused_reservations: result.unused_total(),
            unreserved_instances: result.unreserved_total(),
            qty_running_instances: result.total_running,
            qty_reserved_instances: result.total_reserved,
        }
    }

    fn named(&self) -> [(&'static str, u64); 4] {
        [
            ("unused_reservations", self.unused_reservations),
            ("unreserved_instances", self.unreserved_instances),
            ("qty_running_instances", self.qty_running_instances),
            ("qty_reserved_instances", self.qty_reserved_instances),
        ]
    }
}

/// `{prefix}.{category}.{field}`; an empty prefix drops the leading segment.
pub fn metric_name(prefix: &str, category: &str, field: &str) -> String {
    let category = category.to_lowercase();
    let prefix = prefix.trim().trim_end_matches('.');
    if prefix.is_empty() {
        format!("{category}.{field}")
    } else {
        format!("{prefix}.{category}.{field}")
    }
}

pub struct MetricsReporter {
    prefix: String,
    sink: Arc<dyn MetricsSink>,
}

impl MetricsReporter {
    pub fn new(prefix: impl Into<String>, sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            prefix: prefix.into(),
            sink,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The four gauges for `category`, without sending anything.
    pub fn gauges(&self, category: &str, result: &ReconcileResult) -> Vec<Gauge> {
        CategorySummary::from_result(result)
            .named()
            .into_iter()
            .map(|(field, value)| Gauge {
                name: metric_name(&self.prefix, category, field),
                value,
            })
            .collect()
    }

    /// Send the four gauges for `category`.
    ///
    /// Returns the gauges sent, or an empty list when `result` is missing.
    /// The first send error stops this category; callers decide whether it
    /// fails the run.
    pub async fn report(
        &self,
        category: &str,
        result: Option<&ReconcileResult>,
    ) -> Result<Vec<Gauge>, SinkError> {
        let Some(result) = result else {
            warn!(category, "no reconciliation result; skipping metrics");
            return Ok(Vec::new());
        };

        let gauges = self.gauges(category, result);
        for g in &gauges {
            self.sink.gauge(&g.name, g.value).await?;
            info!(metric = %g.name, value = g.value, "gauge reported");
        }
        Ok(gauges)
    }
}
