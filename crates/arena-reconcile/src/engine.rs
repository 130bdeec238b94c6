use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::verification_category;
use crate::{
    aggregate_postings, aggregate_verifications, CategoryMismatch, LinkDiff, Outcome, Posting,
    ReconcileOutcome, ReconcileReport, StatusCategory, StatusCounts, TipsterRecords, Verification,
};

/// Compare per-category counts.
///
/// Only `win, loss, void, place` are compared, always in that order, so the
/// output does not depend on input ordering. `pending` has no verification
/// analogue; `unspecified` is reported through data-quality warnings.
pub fn detect_mismatches(
    postings: &StatusCounts,
    verifications: &StatusCounts,
) -> Vec<CategoryMismatch> {
    Outcome::COMPARED
        .iter()
        .filter_map(|&category| {
            let posting_count = postings.get(category.into());
            let verification_count = verifications.get(category.into());
            if posting_count == verification_count {
                return None;
            }
            Some(CategoryMismatch {
                category,
                posting_count,
                verification_count,
                delta: posting_count as i64 - verification_count as i64,
            })
        })
        .collect()
}

/// Record-level check of the posting/verification link:
/// - non-pending posting without a verification => MissingVerification
/// - more than one verification for a posting => DuplicateVerification
/// - single verification with a different status => StatusDrift
/// - verification for a posting we do not hold => OrphanVerification
pub fn check_links(postings: &[Posting], verifications: &[Verification]) -> Vec<LinkDiff> {
    let mut diffs: Vec<LinkDiff> = Vec::new();

    let mut by_posting: BTreeMap<&str, Vec<&Verification>> = BTreeMap::new();
    for v in verifications {
        by_posting.entry(v.posting_id.as_str()).or_default().push(v);
    }

    let posting_ids: BTreeSet<&str> = postings.iter().map(|p| p.id.as_str()).collect();

    for p in postings {
        match by_posting.get(p.id.as_str()).map(Vec::as_slice) {
            None | Some([]) => {
                // An unspecified posting status cannot be checked against
                // anything; the aggregator already warns about it.
                if let StatusCategory::Known(o) = p.outcome_status {
                    if o != Outcome::Pending {
                        diffs.push(LinkDiff::MissingVerification {
                            posting_id: p.id.clone(),
                            posting_status: p.outcome_status,
                        });
                    }
                }
            }
            Some([v]) => {
                let verification_status = verification_category(v.status);
                if verification_status != p.outcome_status {
                    diffs.push(LinkDiff::StatusDrift {
                        posting_id: p.id.clone(),
                        posting_status: p.outcome_status,
                        verification_id: v.id.clone(),
                        verification_status,
                    });
                }
            }
            Some(many) => {
                let mut verification_ids: Vec<String> =
                    many.iter().map(|v| v.id.clone()).collect();
                verification_ids.sort();
                diffs.push(LinkDiff::DuplicateVerification {
                    posting_id: p.id.clone(),
                    verification_ids,
                });
            }
        }
    }

    for v in verifications {
        if !posting_ids.contains(v.posting_id.as_str()) {
            diffs.push(LinkDiff::OrphanVerification {
                verification_id: v.id.clone(),
                posting_id: v.posting_id.clone(),
            });
        }
    }

    // Duplicate posting ids would otherwise repeat the same evidence.
    diffs.sort();
    diffs.dedup();
    diffs
}

/// Deterministic reconciliation of one tipster's records.
///
/// - Any category count mismatch => DRIFT
/// - Any record-level link diff => DRIFT
/// - Any status outside the closed set => DRIFT (data quality)
///
/// Mismatches are the expected output of a successful run, never an error.
pub fn reconcile(records: &TipsterRecords) -> ReconcileReport {
    let posting_agg = aggregate_postings(&records.postings);
    let verification_agg = aggregate_verifications(&records.verifications);

    let mismatches = detect_mismatches(&posting_agg.counts, &verification_agg.counts);
    let link_diffs = check_links(&records.postings, &records.verifications);

    let mut warnings = posting_agg.warnings;
    warnings.extend(verification_agg.warnings);
    warnings.sort();

    let outcome = if mismatches.is_empty() && link_diffs.is_empty() && warnings.is_empty() {
        ReconcileOutcome::Clean
    } else {
        ReconcileOutcome::Drift
    };

    ReconcileReport {
        tipster_id: records.tipster_id.clone(),
        outcome,
        total_postings: records.postings.len(),
        total_verifications: records.verifications.len(),
        posting_counts: posting_agg.counts,
        verification_counts: verification_agg.counts,
        mismatches,
        link_diffs,
        warnings,
    }
}

pub fn is_clean_reconcile(records: &TipsterRecords) -> bool {
    reconcile(records).is_clean()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(cats: &[StatusCategory]) -> StatusCounts {
        cats.iter().copied().collect()
    }

    #[test]
    fn pending_is_never_compared() {
        let p = counts(&[StatusCategory::PENDING, StatusCategory::PENDING]);
        let v = counts(&[]);
        assert!(detect_mismatches(&p, &v).is_empty());
    }

    #[test]
    fn unspecified_is_never_compared() {
        let p = counts(&[]);
        let v = counts(&[StatusCategory::Unspecified]);
        assert!(detect_mismatches(&p, &v).is_empty());
    }

    #[test]
    fn negative_delta_when_verifications_exceed_postings() {
        let p = counts(&[StatusCategory::VOID]);
        let v = counts(&[StatusCategory::VOID, StatusCategory::VOID, StatusCategory::VOID]);
        let m = detect_mismatches(&p, &v);
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].category, Outcome::Void);
        assert_eq!(m[0].delta, -2);
        assert_eq!(m[0].to_string(), "void delta=-2 (postings=1 verifications=3)");
    }

    #[test]
    fn mismatches_follow_fixed_category_order() {
        let p = counts(&[StatusCategory::PLACE, StatusCategory::WIN]);
        let v = counts(&[StatusCategory::LOSS]);
        let order: Vec<Outcome> = detect_mismatches(&p, &v)
            .into_iter()
            .map(|m| m.category)
            .collect();
        assert_eq!(order, vec![Outcome::Win, Outcome::Loss, Outcome::Place]);
    }

    #[test]
    fn matched_link_is_clean() {
        let postings = vec![Posting::new("p1", "t1", Some("win"))];
        let verifications = vec![Verification::new("v1", "p1", "t1", Some("win"))];
        assert!(check_links(&postings, &verifications).is_empty());
    }

    #[test]
    fn missing_verification_for_settled_posting() {
        let postings = vec![
            Posting::new("p1", "t1", Some("loss")),
            Posting::new("p2", "t1", Some("pending")),
        ];
        let diffs = check_links(&postings, &[]);
        assert_eq!(
            diffs,
            vec![LinkDiff::MissingVerification {
                posting_id: "p1".to_string(),
                posting_status: StatusCategory::LOSS,
            }]
        );
    }

    #[test]
    fn compensating_errors_are_caught_by_link_check() {
        // Counts agree (one win each) but the records do not line up.
        let postings = vec![
            Posting::new("p1", "t1", Some("win")),
            Posting::new("p2", "t1", Some("pending")),
        ];
        let verifications = vec![Verification::new("v2", "p2", "t1", Some("win"))];

        let records = TipsterRecords {
            tipster_id: "t1".to_string(),
            postings: postings.clone(),
            verifications: verifications.clone(),
        };
        let report = reconcile(&records);
        assert!(report.mismatches.is_empty());
        assert!(!report.is_clean());

        let diffs = check_links(&postings, &verifications);
        assert_eq!(diffs.len(), 2);
        assert!(diffs.contains(&LinkDiff::MissingVerification {
            posting_id: "p1".to_string(),
            posting_status: StatusCategory::WIN,
        }));
        assert!(diffs.contains(&LinkDiff::StatusDrift {
            posting_id: "p2".to_string(),
            posting_status: StatusCategory::PENDING,
            verification_id: "v2".to_string(),
            verification_status: StatusCategory::WIN,
        }));
    }

    #[test]
    fn duplicate_verifications_listed_sorted() {
        let postings = vec![Posting::new("p1", "t1", Some("win"))];
        let verifications = vec![
            Verification::new("v9", "p1", "t1", Some("win")),
            Verification::new("v3", "p1", "t1", Some("win")),
        ];
        let diffs = check_links(&postings, &verifications);
        assert_eq!(
            diffs,
            vec![LinkDiff::DuplicateVerification {
                posting_id: "p1".to_string(),
                verification_ids: vec!["v3".to_string(), "v9".to_string()],
            }]
        );
    }

    #[test]
    fn orphan_verification_detected() {
        let verifications = vec![Verification::new("v1", "gone", "t1", Some("place"))];
        let diffs = check_links(&[], &verifications);
        assert_eq!(
            diffs,
            vec![LinkDiff::OrphanVerification {
                verification_id: "v1".to_string(),
                posting_id: "gone".to_string(),
            }]
        );
    }

    #[test]
    fn unspecified_posting_without_verification_is_not_a_link_diff() {
        let postings = vec![Posting::new("p1", "t1", Some("maybe"))];
        assert!(check_links(&postings, &[]).is_empty());
    }
}
