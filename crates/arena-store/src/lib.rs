//! arena-store
//!
//! Read side of the document store plus the record fetcher.
//!
//! This crate owns the [`DocumentStore`] abstraction and its concrete backends
//! (JSON fixture / in-memory, HTTP, Postgres). It does **not** reconcile;
//! fetched documents are decoded with `arena_reconcile::adapter` and handed to
//! `arena_reconcile::reconcile` by the caller.

pub mod feed;
pub mod fetch;
mod http;
mod memory;
pub mod pg;

use std::fmt;

use serde_json::Value;

pub use feed::{spawn_poll_feed, ChangeEvent, FeedSpec, LocalView};
pub use fetch::{fetch_tipster_records, fetch_with_retry, FetchError, FetchOptions, RetryPolicy};
pub use http::HttpDocumentStore;
pub use memory::MemoryStore;
pub use pg::PgDocumentStore;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`DocumentStore`] implementation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Network, connection or pool failure.
    Transport(String),
    /// The backend answered with an application-level error.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// A required configuration value is missing or invalid.
    Config(String),
}

impl StoreError {
    /// Transport failures, throttling and server-side errors may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Transport(_) => true,
            StoreError::Api { status, .. } => *status == 429 || *status >= 500,
            StoreError::Decode(_) | StoreError::Config(_) => false,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "transport error: {msg}"),
            StoreError::Api { status, message } => {
                write!(f, "store api error status={status}: {message}")
            }
            StoreError::Decode(msg) => write!(f, "decode error: {msg}"),
            StoreError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Read interface of the managed document store.
///
/// Object safe so callers can hold `Arc<dyn DocumentStore>` without knowing the
/// backend.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs (e.g. `"memory"`, `"http"`).
    fn name(&self) -> &'static str;

    /// All documents in `collection` whose `field` equals `value`.
    ///
    /// Order is backend-defined; reconciliation does not depend on it.
    async fn fetch_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError>;
}

// ---------------------------------------------------------------------------
// Collection layout
// ---------------------------------------------------------------------------

/// Where postings and verifications live and which field scopes them to a tipster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
    pub postings: String,
    pub verifications: String,
    pub posting_author_field: String,
    pub verification_author_field: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            postings: "tips".to_string(),
            verifications: "tip_verifications".to_string(),
            posting_author_field: "authorId".to_string(),
            verification_author_field: "authorId".to_string(),
        }
    }
}

/// Document id as stored in the `id` field, trimmed. `None` if absent or blank.
pub fn doc_id(doc: &Value) -> Option<&str> {
    doc.get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
