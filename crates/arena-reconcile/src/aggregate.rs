//! Status aggregation: partition a collection into `category -> count`.
//!
//! Aggregation is total: every record lands in exactly one bucket, so the
//! bucket counts always sum to the input length.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{DataQualityWarning, Posting, RecordKind, StatusCategory, Verification};

/// Per-category counts. Categories never observed are absent (count 0).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StatusCounts {
    counts: BTreeMap<StatusCategory, usize>,
}

impl StatusCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, category: StatusCategory) {
        *self.counts.entry(category).or_insert(0) += 1;
    }

    pub fn get(&self, category: StatusCategory) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Non-zero buckets in report order.
    pub fn iter(&self) -> impl Iterator<Item = (StatusCategory, usize)> + '_ {
        self.counts.iter().map(|(c, n)| (*c, *n))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl FromIterator<StatusCategory> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = StatusCategory>>(iter: I) -> Self {
        let mut out = StatusCounts::new();
        for c in iter {
            out.record(c);
        }
        out
    }
}

/// Counts plus the data-quality warnings raised while counting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub counts: StatusCounts,
    /// Sorted by `(kind, record_id)`.
    pub warnings: Vec<DataQualityWarning>,
}

impl Aggregate {
    fn push(&mut self, kind: RecordKind, id: &str, category: StatusCategory, raw: Option<&str>) {
        if category == StatusCategory::Unspecified {
            self.warnings.push(DataQualityWarning {
                kind,
                record_id: id.to_string(),
                raw_status: raw.map(str::to_string),
            });
        }
        self.counts.record(category);
    }

    fn finish(mut self) -> Self {
        self.warnings.sort();
        self
    }
}

/// Postings accept `{pending, win, loss, void, place}`.
pub fn aggregate_postings(postings: &[Posting]) -> Aggregate {
    let mut agg = Aggregate::default();
    for p in postings {
        agg.push(
            RecordKind::Posting,
            &p.id,
            p.outcome_status,
            p.raw_status.as_deref(),
        );
    }
    agg.finish()
}

/// Verifications accept `{win, loss, void, place}`; a `pending` verification
/// is outside the closed set and counted as unspecified.
pub fn aggregate_verifications(verifications: &[Verification]) -> Aggregate {
    let mut agg = Aggregate::default();
    for v in verifications {
        let category = verification_category(v.status);
        agg.push(
            RecordKind::Verification,
            &v.id,
            category,
            v.raw_status.as_deref(),
        );
    }
    agg.finish()
}

pub(crate) fn verification_category(status: StatusCategory) -> StatusCategory {
    if status.is_pending() {
        StatusCategory::Unspecified
    } else {
        status
    }
}
