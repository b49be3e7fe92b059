//! rck-reconcile
//!
//! Reservation reconciliation engine.
//!
//! Given running counts and reserved counts keyed by (resource shape,
//! placement dimension), computes per-placement surplus and deficit, spreads
//! flexible reservations over same-shape deficits, and splits the outcome
//! into unused reservations and unreserved instances.
//!
//! Deterministic, pure logic. No IO. No provider calls.

mod engine;
pub mod report;
mod types;

pub use engine::{allocate_wildcards, build_diff, categorize, reconcile};
pub use report::{CategoryReport, ExpiringReservation, PlacementNotes};
pub use types::*;
