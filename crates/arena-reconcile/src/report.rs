//! Report emitter: the operator-facing view of one reconcile run.
//!
//! Pure formatting over already-validated data; no failure modes.

use std::fmt::{self, Write as _};

use serde::Serialize;

use crate::{
    CategoryMismatch, DataQualityWarning, LinkDiff, ReconcileOutcome, StatusCategory,
    StatusCounts,
};

/// Full report. Stable ordering of every list is enforced by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub tipster_id: String,
    pub outcome: ReconcileOutcome,
    pub total_postings: usize,
    pub total_verifications: usize,
    pub posting_counts: StatusCounts,
    pub verification_counts: StatusCounts,
    pub mismatches: Vec<CategoryMismatch>,
    pub link_diffs: Vec<LinkDiff>,
    pub warnings: Vec<DataQualityWarning>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.outcome == ReconcileOutcome::Clean
    }

    /// `true` when the category counts agree, regardless of link diffs or
    /// data-quality warnings.
    pub fn counts_agree(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn mismatch_for(&self, category: crate::Outcome) -> Option<&CategoryMismatch> {
        self.mismatches.iter().find(|m| m.category == category)
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_text(self))
    }
}

/// Human-readable summary.
///
/// ```text
/// reconcile tipster=t1 outcome=DRIFT
/// postings=5 verifications=4
/// category     postings  verifications
/// win                 0              0
/// loss                5              4
/// ...
/// category result: 1 mismatch
///   loss delta=+1 (postings=5 verifications=4)
/// ```
pub fn render_text(report: &ReconcileReport) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "reconcile tipster={} outcome={}",
        report.tipster_id,
        report.outcome.as_str()
    );
    let _ = writeln!(
        out,
        "postings={} verifications={}",
        report.total_postings, report.total_verifications
    );

    let _ = writeln!(out, "{:<12} {:>9} {:>14}", "category", "postings", "verifications");
    for category in StatusCategory::ALL {
        let verifications = if category.is_pending() {
            "-".to_string()
        } else {
            report.verification_counts.get(category).to_string()
        };
        let _ = writeln!(
            out,
            "{:<12} {:>9} {:>14}",
            category.as_str(),
            report.posting_counts.get(category),
            verifications
        );
    }

    match report.mismatches.len() {
        0 => {
            let _ = writeln!(out, "category result: no mismatches");
        }
        1 => {
            let _ = writeln!(out, "category result: 1 mismatch");
        }
        n => {
            let _ = writeln!(out, "category result: {n} mismatches");
        }
    }
    for m in &report.mismatches {
        let _ = writeln!(out, "  {m}");
    }

    if !report.link_diffs.is_empty() {
        let _ = writeln!(out, "record findings: {}", report.link_diffs.len());
        for d in &report.link_diffs {
            let _ = writeln!(out, "  {d}");
        }
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "data quality warnings: {}", report.warnings.len());
        for w in &report.warnings {
            let _ = writeln!(out, "  {w}");
        }
    }

    if report.mismatches.is_empty() && !report.is_clean() {
        let _ = writeln!(
            out,
            "note: category counts agree; outcome is DRIFT because of the findings above"
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use crate::{reconcile, Posting, TipsterRecords, Verification};

    #[test]
    fn empty_run_says_no_mismatches() {
        let report = reconcile(&TipsterRecords::new("t0"));
        let text = report.to_string();
        assert!(text.starts_with("reconcile tipster=t0 outcome=CLEAN\n"));
        assert!(text.contains("postings=0 verifications=0"));
        assert!(text.contains("result: no mismatches"));
        assert!(!text.contains("record findings"));
        assert!(!text.contains("data quality warnings"));
    }

    #[test]
    fn breakdown_lists_every_category() {
        let report = reconcile(&TipsterRecords::new("t0"));
        let text = report.to_string();
        for name in ["win", "loss", "void", "place", "pending", "unspecified"] {
            assert!(
                text.lines().any(|l| l.starts_with(name)),
                "missing breakdown row for {name}"
            );
        }
    }

    #[test]
    fn signed_delta_and_findings_are_rendered() {
        let mut records = TipsterRecords::new("t1");
        records.postings.push(Posting::new("p1", "t1", Some("loss")));
        records
            .verifications
            .push(Verification::new("v1", "p7", "t1", Some("drawn")));

        let text = reconcile(&records).to_string();
        assert!(text.contains("outcome=DRIFT"));
        assert!(text.contains("category result: 1 mismatch\n"));
        assert!(!text.contains("note: category counts agree"));
        assert!(text.contains("  loss delta=+1 (postings=1 verifications=0)"));
        assert!(text.contains("missing verification: posting 'p1' is loss"));
        assert!(text.contains("orphan verification: 'v1' references unknown posting 'p7'"));
        assert!(text.contains("verification 'v1' has status 'drawn' outside the known set"));
    }

    #[test]
    fn drift_without_mismatches_explains_the_verdict() {
        let mut records = TipsterRecords::new("t1");
        records.postings.push(Posting::new("p1", "t1", Some("drawn")));
        records
            .verifications
            .push(Verification::new("v1", "p1", "t1", Some("drawn")));

        let report = reconcile(&records);
        assert!(report.mismatches.is_empty());
        assert!(!report.warnings.is_empty());
        let text = report.to_string();
        assert!(text.contains("outcome=DRIFT"));
        assert!(text.contains("category result: no mismatches\n"));
        assert!(text.ends_with(
            "note: category counts agree; outcome is DRIFT because of the findings above\n"
        ));
    }

    #[test]
    fn json_shape_is_stable() {
        let mut records = TipsterRecords::new("t1");
        records.postings.push(Posting::new("p1", "t1", Some("win")));
        records
            .verifications
            .push(Verification::new("v1", "p1", "t1", Some("win")));

        let v = serde_json::to_value(reconcile(&records)).unwrap();
        assert_eq!(v["tipster_id"], "t1");
        assert_eq!(v["outcome"], "CLEAN");
        assert_eq!(v["posting_counts"]["win"], 1);
        assert_eq!(v["verification_counts"]["win"], 1);
        assert_eq!(v["mismatches"], serde_json::json!([]));
    }
}
