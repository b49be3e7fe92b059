//! Plain-text rendering of a [`ReconcileResult`].
//!
//! The engine only counts. Which instances sit behind an unreserved key, and
//! when the reservations behind an unused key run out, come from the snapshot
//! builder as [`PlacementNotes`] and are joined here for operators.

use std::collections::BTreeMap;
use std::fmt;

use crate::{PlacementKey, ReconcileResult};

/// Per-placement annotations collected alongside the inventory counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlacementNotes {
    /// Instance names or identifiers running at each placement.
    pub instance_ids: BTreeMap<PlacementKey, Vec<String>>,
    /// Whole days until each reservation at a placement expires.
    pub expiry_days: BTreeMap<PlacementKey, Vec<i64>>,
}

impl PlacementNotes {
    pub fn add_instance(&mut self, key: &PlacementKey, id: impl Into<String>) {
        self.instance_ids
            .entry(key.clone())
            .or_default()
            .push(id.into());
    }

    pub fn add_expiry(&mut self, key: &PlacementKey, days: i64) {
        self.expiry_days.entry(key.clone()).or_default().push(days);
    }
}

/// A reservation that runs out within the warning window.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExpiringReservation {
    pub days: i64,
    pub key: PlacementKey,
}

#[derive(Clone, Debug)]
pub struct CategoryReport<'a> {
    pub result: &'a ReconcileResult,
    pub notes: &'a PlacementNotes,
    pub expiry_warning_days: i64,
}

impl<'a> CategoryReport<'a> {
    pub fn new(
        result: &'a ReconcileResult,
        notes: &'a PlacementNotes,
        expiry_warning_days: i64,
    ) -> Self {
        Self {
            result,
            notes,
            expiry_warning_days,
        }
    }

    /// Reservations expiring within the warning window, soonest first.
    pub fn expiring(&self) -> Vec<ExpiringReservation> {
        let mut out: Vec<ExpiringReservation> = self
            .notes
            .expiry_days
            .iter()
            .flat_map(|(key, days)| {
                days.iter()
                    .filter(|d| **d <= self.expiry_warning_days)
                    .map(|d| ExpiringReservation {
                        days: *d,
                        key: key.clone(),
                    })
            })
            .collect();
        out.sort();
        out
    }

    fn expiry_note(&self, key: &PlacementKey) -> String {
        let Some(days) = self.notes.expiry_days.get(key) else {
            return String::new();
        };
        let mut days = days.clone();
        days.sort_unstable();
        let parts: Vec<String> = days
            .iter()
            .map(|d| {
                if *d <= self.expiry_warning_days {
                    format!("{d}d EXPIRING")
                } else {
                    format!("{d}d")
                }
            })
            .collect();
        format!(" [expires in {}]", parts.join(", "))
    }

    fn instance_note(&self, key: &PlacementKey) -> String {
        match self.notes.instance_ids.get(key) {
            Some(ids) if !ids.is_empty() => format!(" [{}]", ids.join(", ")),
            _ => String::new(),
        }
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CategoryReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.result;

        writeln!(f, "{} unused reservations", r.category)?;
        if r.unused_reservations.is_empty() {
            f.write_str("  (none)\n")?;
        }
        for (key, count) in &r.unused_reservations {
            writeln!(f, "  {key}: {count}{}", self.expiry_note(key))?;
        }

        writeln!(f, "{} unreserved instances", r.category)?;
        if r.unreserved_instances.is_empty() {
            f.write_str("  (none)\n")?;
        }
        for (key, count) in &r.unreserved_instances {
            writeln!(f, "  {key}: {count}{}", self.instance_note(key))?;
        }

        writeln!(
            f,
            "{} totals running={} reserved={} unused={} unreserved={}",
            r.category,
            r.total_running,
            r.total_reserved,
            r.unused_total(),
            r.unreserved_total()
        )
    }
}
