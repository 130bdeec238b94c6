//! Document adapter: decode stored tip documents into internal types.
//!
//! The document store hands back loosely-typed JSON in the application's
//! camelCase schema (`authorId`, `outcomeStatus`, `postingId`, ...). This module
//! mirrors that schema in `Raw*` structs and normalizes into [`Posting`] /
//! [`Verification`].
//!
//! # Rules
//! - Pure conversion. No IO.
//! - Missing identity fields and unreadable timestamps are errors: a record we
//!   cannot attribute would silently skew the counts.
//! - An unknown or missing *status* is never an error. It is classified as
//!   unspecified and surfaced later as a data-quality warning.
//! - Unknown fields are ignored so schema additions do not break decoding.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{Posting, RecordKind, StatusCategory, Verification};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The document is not an object of the expected shape.
    Malformed { kind: RecordKind, reason: String },
    /// `id` was empty or missing.
    MissingId { kind: RecordKind },
    /// A required field was empty or missing.
    MissingField {
        kind: RecordKind,
        record_id: String,
        field: &'static str,
    },
    /// A timestamp field could not be read.
    BadTimestamp {
        kind: RecordKind,
        record_id: String,
        field: &'static str,
        raw: String,
    },
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed { kind, reason } => write!(f, "malformed {kind} document: {reason}"),
            Self::MissingId { kind } => write!(f, "{kind} document has empty id"),
            Self::MissingField {
                kind,
                record_id,
                field,
            } => write!(f, "{kind} '{record_id}' is missing required field '{field}'"),
            Self::BadTimestamp {
                kind,
                record_id,
                field,
                raw,
            } => write!(
                f,
                "{kind} '{record_id}' has unreadable timestamp {field}={raw}"
            ),
        }
    }
}

impl std::error::Error for AdapterError {}

// ---------------------------------------------------------------------------
// Raw document structs
// ---------------------------------------------------------------------------

/// Stored tip document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPostingDoc {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub sport: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Kept as a raw value: a number or object here is bad data, not a decode failure.
    #[serde(default)]
    pub outcome_status: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub verified_at: Option<Value>,
    #[serde(default)]
    pub verified_by: Option<String>,
}

/// Stored verification document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVerificationDoc {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub posting_id: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub decided_by: Option<String>,
    #[serde(default)]
    pub decided_at: Option<Value>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalization helpers
// ---------------------------------------------------------------------------

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn require(
    kind: RecordKind,
    record_id: &str,
    field: &'static str,
    value: Option<String>,
) -> Result<String, AdapterError> {
    non_empty(value).ok_or_else(|| AdapterError::MissingField {
        kind,
        record_id: record_id.to_string(),
        field,
    })
}

/// Status value exactly as stored. `null` counts as missing.
fn raw_status(v: Option<Value>) -> Option<String> {
    match v {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    }
}

/// Accepted timestamp encodings:
/// - RFC 3339 string
/// - integer epoch milliseconds
/// - `{ "seconds": .., "nanoseconds": .. }` (also `_seconds` / `_nanoseconds`)
pub fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(map) => {
            let secs = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let nanos = u32::try_from(nanos).ok()?;
            Utc.timestamp_opt(secs, nanos).single()
        }
        _ => None,
    }
}

fn timestamp(
    kind: RecordKind,
    record_id: &str,
    field: &'static str,
    v: Option<Value>,
) -> Result<Option<DateTime<Utc>>, AdapterError> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_timestamp(&v)
            .map(Some)
            .ok_or_else(|| AdapterError::BadTimestamp {
                kind,
                record_id: record_id.to_string(),
                field,
                raw: v.to_string(),
            }),
    }
}

fn required_timestamp(
    kind: RecordKind,
    record_id: &str,
    field: &'static str,
    v: Option<Value>,
) -> Result<DateTime<Utc>, AdapterError> {
    timestamp(kind, record_id, field, v)?.ok_or_else(|| AdapterError::MissingField {
        kind,
        record_id: record_id.to_string(),
        field,
    })
}

fn decode<T: for<'de> Deserialize<'de>>(kind: RecordKind, doc: &Value) -> Result<T, AdapterError> {
    T::deserialize(doc).map_err(|e| AdapterError::Malformed {
        kind,
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn normalize_posting(doc: &Value) -> Result<Posting, AdapterError> {
    const KIND: RecordKind = RecordKind::Posting;
    let raw: RawPostingDoc = decode(KIND, doc)?;

    let id = non_empty(raw.id).ok_or(AdapterError::MissingId { kind: KIND })?;
    let author_id = require(KIND, &id, "authorId", raw.author_id)?;
    let created_at = required_timestamp(KIND, &id, "createdAt", raw.created_at)?;
    let verified_at = timestamp(KIND, &id, "verifiedAt", raw.verified_at)?;
    let raw_status = raw_status(raw.outcome_status);

    Ok(Posting {
        id,
        author_id,
        sport: raw.sport.unwrap_or_default(),
        title: raw.title.unwrap_or_default(),
        outcome_status: StatusCategory::for_posting(raw_status.as_deref()),
        raw_status,
        created_at,
        verified_at,
        verified_by: non_empty(raw.verified_by),
    })
}

pub fn normalize_verification(doc: &Value) -> Result<Verification, AdapterError> {
    const KIND: RecordKind = RecordKind::Verification;
    let raw: RawVerificationDoc = decode(KIND, doc)?;

    let id = non_empty(raw.id).ok_or(AdapterError::MissingId { kind: KIND })?;
    let posting_id = require(KIND, &id, "postingId", raw.posting_id)?;
    let author_id = require(KIND, &id, "authorId", raw.author_id)?;
    let decided_by = require(KIND, &id, "decidedBy", raw.decided_by)?;
    let decided_at = required_timestamp(KIND, &id, "decidedAt", raw.decided_at)?;
    let raw_status = raw_status(raw.status);

    Ok(Verification {
        id,
        posting_id,
        author_id,
        status: StatusCategory::for_verification(raw_status.as_deref()),
        raw_status,
        decided_by,
        decided_at,
        notes: non_empty(raw.notes),
    })
}

/// Normalize every document; stops on the first error. A partial collection
/// is never returned.
pub fn normalize_postings(docs: &[Value]) -> Result<Vec<Posting>, AdapterError> {
    docs.iter().map(normalize_posting).collect()
}

pub fn normalize_verifications(docs: &[Value]) -> Result<Vec<Verification>, AdapterError> {
    docs.iter().map(normalize_verification).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn posting_doc(id: &str, status: Value) -> Value {
        json!({
            "id": id,
            "authorId": "tipster-1",
            "sport": "football",
            "title": "Arsenal to win",
            "outcomeStatus": status,
            "createdAt": "2024-03-01T12:00:00Z",
        })
    }

    fn verification_doc(id: &str, posting_id: &str, status: Value) -> Value {
        json!({
            "id": id,
            "postingId": posting_id,
            "authorId": "tipster-1",
            "status": status,
            "decidedBy": "admin-7",
            "decidedAt": 1_709_300_000_000_i64,
        })
    }

    #[test]
    fn posting_normalizes() {
        let p = normalize_posting(&posting_doc("p1", json!("Win"))).unwrap();
        assert_eq!(p.id, "p1");
        assert_eq!(p.author_id, "tipster-1");
        assert_eq!(p.sport, "football");
        assert_eq!(p.outcome_status, StatusCategory::WIN);
        assert_eq!(p.raw_status.as_deref(), Some("Win"));
        assert_eq!(p.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
        assert_eq!(p.verified_at, None);
    }

    #[test]
    fn unknown_status_is_not_an_error() {
        let p = normalize_posting(&posting_doc("p1", json!("drawn"))).unwrap();
        assert_eq!(p.outcome_status, StatusCategory::Unspecified);
        assert_eq!(p.raw_status.as_deref(), Some("drawn"));

        let p = normalize_posting(&posting_doc("p2", json!(3))).unwrap();
        assert_eq!(p.outcome_status, StatusCategory::Unspecified);
        assert_eq!(p.raw_status.as_deref(), Some("3"));

        let p = normalize_posting(&posting_doc("p3", Value::Null)).unwrap();
        assert_eq!(p.outcome_status, StatusCategory::Unspecified);
        assert_eq!(p.raw_status, None);
    }

    #[test]
    fn whitespace_trimmed_ids() {
        let mut doc = posting_doc("  p1  ", json!("loss"));
        doc["authorId"] = json!("  tipster-1 ");
        let p = normalize_posting(&doc).unwrap();
        assert_eq!(p.id, "p1");
        assert_eq!(p.author_id, "tipster-1");
    }

    #[test]
    fn empty_id_errors() {
        let err = normalize_posting(&posting_doc("", json!("win"))).unwrap_err();
        assert_eq!(
            err,
            AdapterError::MissingId {
                kind: RecordKind::Posting
            }
        );
    }

    #[test]
    fn missing_author_errors() {
        let mut doc = posting_doc("p1", json!("win"));
        doc.as_object_mut().unwrap().remove("authorId");
        assert!(matches!(
            normalize_posting(&doc),
            Err(AdapterError::MissingField {
                field: "authorId",
                ..
            })
        ));
    }

    #[test]
    fn bad_timestamp_errors() {
        let mut doc = posting_doc("p1", json!("win"));
        doc["createdAt"] = json!("yesterday");
        assert!(matches!(
            normalize_posting(&doc),
            Err(AdapterError::BadTimestamp {
                field: "createdAt",
                ..
            })
        ));
    }

    #[test]
    fn non_object_document_is_malformed() {
        assert!(matches!(
            normalize_posting(&json!(["not", "a", "doc"])),
            Err(AdapterError::Malformed { .. })
        ));
    }

    #[test]
    fn verification_normalizes_from_epoch_millis() {
        let v = normalize_verification(&verification_doc("v1", "p1", json!("place"))).unwrap();
        assert_eq!(v.posting_id, "p1");
        assert_eq!(v.status, StatusCategory::PLACE);
        assert_eq!(v.decided_by, "admin-7");
        assert_eq!(v.decided_at.timestamp_millis(), 1_709_300_000_000);
    }

    #[test]
    fn pending_verification_is_unspecified() {
        let v = normalize_verification(&verification_doc("v1", "p1", json!("pending"))).unwrap();
        assert_eq!(v.status, StatusCategory::Unspecified);
    }

    #[test]
    fn verification_missing_posting_id_errors() {
        let mut doc = verification_doc("v1", "p1", json!("win"));
        doc["postingId"] = json!("");
        assert!(matches!(
            normalize_verification(&doc),
            Err(AdapterError::MissingField {
                field: "postingId",
                ..
            })
        ));
    }

    #[test]
    fn seconds_object_timestamps() {
        let ts = parse_timestamp(&json!({ "_seconds": 1_700_000_000, "_nanoseconds": 5 })).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        let ts = parse_timestamp(&json!({ "seconds": 1_700_000_001 })).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_001);
        assert!(parse_timestamp(&json!(true)).is_none());
    }

    #[test]
    fn normalize_stops_on_first_bad_document() {
        let docs = vec![
            posting_doc("p1", json!("win")),
            posting_doc("", json!("win")),
        ];
        assert!(normalize_postings(&docs).is_err());
    }
}
