//! Record fetcher.
//!
//! Pulls one tipster's postings and verifications from a [`DocumentStore`]:
//! - both reads are issued concurrently and joined before returning
//! - each read is retried with exponential backoff on retryable errors
//! - an optional deadline bounds the joined fetch
//! - documents are decoded through `arena_reconcile::adapter`
//!
//! Any failure fails the whole fetch. A caller never receives one collection
//! without the other.

use std::fmt;
use std::time::Duration;

use arena_reconcile::adapter::{normalize_postings, normalize_verifications, AdapterError};
use arena_reconcile::TipsterRecords;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{Collections, DocumentStore, StoreError};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Exponential backoff: `initial_backoff * 2^(attempt-1)`, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (>= 1).
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Sleep before retry number `attempt` (1-based: the wait after the first failure is `backoff_for(1)`).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << shift;
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Upper bound on the joined fetch (both collections, retries included).
    pub deadline: Option<Duration>,
    pub retry: RetryPolicy,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum FetchError {
    /// Tipster id was empty or whitespace.
    InvalidTipster,
    /// A store read failed (after retries, if the error was retryable).
    Store {
        collection: String,
        attempts: u32,
        source: StoreError,
    },
    /// A fetched document could not be decoded.
    Decode(AdapterError),
    /// The joined fetch did not finish within the deadline.
    DeadlineExceeded { deadline: Duration },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::InvalidTipster => write!(f, "tipster id must be a non-empty string"),
            FetchError::Store {
                collection,
                attempts,
                source,
            } => write!(
                f,
                "fetch from '{collection}' failed after {attempts} attempt(s): {source}"
            ),
            FetchError::Decode(e) => write!(f, "fetched document rejected: {e}"),
            FetchError::DeadlineExceeded { deadline } => {
                write!(f, "fetch exceeded deadline of {}ms", deadline.as_millis())
            }
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Store { source, .. } => Some(source),
            FetchError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// One `fetch_by_field` call under `policy`.
pub async fn fetch_with_retry(
    store: &dyn DocumentStore,
    collection: &str,
    field: &str,
    value: &str,
    policy: &RetryPolicy,
) -> Result<Vec<Value>, FetchError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match store.fetch_by_field(collection, field, value).await {
            Ok(docs) => {
                debug!(
                    store = store.name(),
                    collection,
                    attempt,
                    docs = docs.len(),
                    "store read ok"
                );
                return Ok(docs);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let wait = policy.backoff_for(attempt);
                warn!(
                    store = store.name(),
                    collection,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %e,
                    "store read failed; retrying"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(source) => {
                return Err(FetchError::Store {
                    collection: collection.to_string(),
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}

/// Fetch and decode every posting and verification authored by `tipster_id`.
pub async fn fetch_tipster_records(
    store: &dyn DocumentStore,
    collections: &Collections,
    tipster_id: &str,
    opts: &FetchOptions,
) -> Result<TipsterRecords, FetchError> {
    let tipster_id = tipster_id.trim();
    if tipster_id.is_empty() {
        return Err(FetchError::InvalidTipster);
    }

    let joined = async {
        tokio::try_join!(
            fetch_with_retry(
                store,
                &collections.postings,
                &collections.posting_author_field,
                tipster_id,
                &opts.retry,
            ),
            fetch_with_retry(
                store,
                &collections.verifications,
                &collections.verification_author_field,
                tipster_id,
                &opts.retry,
            ),
        )
    };

    let (posting_docs, verification_docs) = match opts.deadline {
        Some(deadline) => tokio::time::timeout(deadline, joined)
            .await
            .map_err(|_| FetchError::DeadlineExceeded { deadline })??,
        None => joined.await?,
    };

    let postings = normalize_postings(&posting_docs).map_err(FetchError::Decode)?;
    let verifications = normalize_verifications(&verification_docs).map_err(FetchError::Decode)?;

    info!(
        store = store.name(),
        tipster_id,
        postings = postings.len(),
        verifications = verifications.len(),
        "fetched tipster records"
    );

    Ok(TipsterRecords {
        tipster_id: tipster_id.to_string(),
        postings,
        verifications,
    })
}
