//! arena-reconcile
//!
//! Tip verification reconciliation.
//!
//! Every Posting whose outcome is not `pending` should be backed by exactly one
//! Verification with the same status. This crate detects drift between the
//! denormalized status on Postings and the authoritative Verification records:
//! - per-category count comparison (win / loss / void / place)
//! - per-record link check (missing, duplicate, orphaned, drifted verifications)
//! - data-quality warnings for statuses outside the closed set
//!
//! Deterministic, pure logic. No IO. No store calls.

pub mod adapter;
mod aggregate;
mod engine;
mod report;
mod types;

pub use aggregate::{aggregate_postings, aggregate_verifications, Aggregate, StatusCounts};
pub use engine::{check_links, detect_mismatches, is_clean_reconcile, reconcile};
pub use report::{render_text, ReconcileReport};
pub use types::*;
