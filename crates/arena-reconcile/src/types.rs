use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Closed set of tip outcomes.
///
/// Declaration order is the report order: win, loss, void, place, pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Void,
    Place,
    Pending,
}

impl Outcome {
    /// Outcomes compared between postings and verifications.
    /// `Pending` has no verification analogue and is never compared.
    pub const COMPARED: [Outcome; 4] = [Outcome::Win, Outcome::Loss, Outcome::Void, Outcome::Place];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "win",
            Outcome::Loss => "loss",
            Outcome::Void => "void",
            Outcome::Place => "place",
            Outcome::Pending => "pending",
        }
    }

    /// Case-insensitive parse of the closed set. Anything else is `None`.
    pub fn parse(raw: &str) -> Option<Outcome> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "win" => Some(Outcome::Win),
            "loss" => Some(Outcome::Loss),
            "void" => Some(Outcome::Void),
            "place" => Some(Outcome::Place),
            "pending" => Some(Outcome::Pending),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregation bucket for a record's status field.
///
/// Values outside the closed set (or a missing field) land in `Unspecified`
/// instead of being dropped, so data-quality problems show up in the report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusCategory {
    Known(Outcome),
    Unspecified,
}

impl StatusCategory {
    pub const WIN: StatusCategory = StatusCategory::Known(Outcome::Win);
    pub const LOSS: StatusCategory = StatusCategory::Known(Outcome::Loss);
    pub const VOID: StatusCategory = StatusCategory::Known(Outcome::Void);
    pub const PLACE: StatusCategory = StatusCategory::Known(Outcome::Place);
    pub const PENDING: StatusCategory = StatusCategory::Known(Outcome::Pending);

    /// Every bucket in report order.
    pub const ALL: [StatusCategory; 6] = [
        StatusCategory::WIN,
        StatusCategory::LOSS,
        StatusCategory::VOID,
        StatusCategory::PLACE,
        StatusCategory::PENDING,
        StatusCategory::Unspecified,
    ];

    /// Classify a posting status: `{pending, win, loss, void, place}`.
    pub fn for_posting(raw: Option<&str>) -> Self {
        match raw.and_then(Outcome::parse) {
            Some(o) => StatusCategory::Known(o),
            None => StatusCategory::Unspecified,
        }
    }

    /// Classify a verification status: `{win, loss, void, place}`.
    /// A verification can never be `pending`.
    pub fn for_verification(raw: Option<&str>) -> Self {
        match raw.and_then(Outcome::parse) {
            Some(Outcome::Pending) | None => StatusCategory::Unspecified,
            Some(o) => StatusCategory::Known(o),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCategory::Known(o) => o.as_str(),
            StatusCategory::Unspecified => "unspecified",
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self {
            StatusCategory::Known(o) => Some(*o),
            StatusCategory::Unspecified => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        *self == StatusCategory::PENDING
    }
}

impl From<Outcome> for StatusCategory {
    fn from(o: Outcome) -> Self {
        StatusCategory::Known(o)
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Serialized as a bare string so it can key JSON maps.
impl Serialize for StatusCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Which collection a record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Posting,
    Verification,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Posting => "posting",
            RecordKind::Verification => "verification",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tip as posted by its author.
///
/// `outcome_status` is mutated only by the verification workflow.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Posting {
    pub id: String,
    pub author_id: String,
    pub sport: String,
    pub title: String,
    pub outcome_status: StatusCategory,
    /// Status exactly as stored, kept for anomaly reporting.
    pub raw_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
}

impl Posting {
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        raw_status: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            sport: String::new(),
            title: String::new(),
            outcome_status: StatusCategory::for_posting(raw_status),
            raw_status: raw_status.map(str::to_string),
            created_at: DateTime::<Utc>::default(),
            verified_at: None,
            verified_by: None,
        }
    }
}

/// Administrative decision on a posting's real-world outcome. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub id: String,
    pub posting_id: String,
    /// The tipster who authored the verified posting.
    pub author_id: String,
    pub status: StatusCategory,
    pub raw_status: Option<String>,
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Verification {
    pub fn new(
        id: impl Into<String>,
        posting_id: impl Into<String>,
        author_id: impl Into<String>,
        raw_status: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            posting_id: posting_id.into(),
            author_id: author_id.into(),
            status: StatusCategory::for_verification(raw_status),
            raw_status: raw_status.map(str::to_string),
            decided_by: String::new(),
            decided_at: DateTime::<Utc>::default(),
            notes: None,
        }
    }
}

/// Immutable snapshot of one tipster's records for a single reconcile run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TipsterRecords {
    pub tipster_id: String,
    pub postings: Vec<Posting>,
    pub verifications: Vec<Verification>,
}

impl TipsterRecords {
    pub fn new(tipster_id: impl Into<String>) -> Self {
        Self {
            tipster_id: tipster_id.into(),
            postings: Vec::new(),
            verifications: Vec::new(),
        }
    }
}

/// Non-fatal: a record's status is outside its closed set.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DataQualityWarning {
    pub kind: RecordKind,
    pub record_id: String,
    /// `None` when the status field was missing entirely.
    pub raw_status: Option<String>,
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw_status {
            Some(raw) => write!(
                f,
                "{} '{}' has status '{}' outside the known set; counted as unspecified",
                self.kind, self.record_id, raw
            ),
            None => write!(
                f,
                "{} '{}' has no status; counted as unspecified",
                self.kind, self.record_id
            ),
        }
    }
}

/// Count discrepancy for one compared category.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct CategoryMismatch {
    pub category: Outcome,
    pub posting_count: usize,
    pub verification_count: usize,
    /// `posting_count - verification_count`.
    pub delta: i64,
}

impl fmt::Display for CategoryMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} delta={:+} (postings={} verifications={})",
            self.category, self.delta, self.posting_count, self.verification_count
        )
    }
}

/// Record-level evidence that a posting and its verification disagree.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkDiff {
    MissingVerification {
        posting_id: String,
        posting_status: StatusCategory,
    },

    DuplicateVerification {
        posting_id: String,
        verification_ids: Vec<String>,
    },

    StatusDrift {
        posting_id: String,
        posting_status: StatusCategory,
        verification_id: String,
        verification_status: StatusCategory,
    },

    OrphanVerification {
        verification_id: String,
        posting_id: String,
    },
}

impl fmt::Display for LinkDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDiff::MissingVerification {
                posting_id,
                posting_status,
            } => write!(
                f,
                "missing verification: posting '{posting_id}' is {posting_status}"
            ),
            LinkDiff::DuplicateVerification {
                posting_id,
                verification_ids,
            } => write!(
                f,
                "duplicate verification: posting '{posting_id}' has {} records [{}]",
                verification_ids.len(),
                verification_ids.join(", ")
            ),
            LinkDiff::StatusDrift {
                posting_id,
                posting_status,
                verification_id,
                verification_status,
            } => write!(
                f,
                "status drift: posting '{posting_id}' is {posting_status} \
                 but verification '{verification_id}' is {verification_status}"
            ),
            LinkDiff::OrphanVerification {
                verification_id,
                posting_id,
            } => write!(
                f,
                "orphan verification: '{verification_id}' references unknown posting '{posting_id}'"
            ),
        }
    }
}

/// Overall verdict of a reconcile run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReconcileOutcome {
    Clean,
    Drift,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Clean => "CLEAN",
            ReconcileOutcome::Drift => "DRIFT",
        }
    }
}
