//! Change feed.
//!
//! Explicit event stream in place of listener callbacks:
//! - a producer task polls the store for one tipster's documents, diffs each
//!   poll against the previous one and emits [`ChangeEvent`]s on an mpsc channel
//! - every poll that changed something ends with [`ChangeEvent::Synced`]
//! - a consumer applies the events to a [`LocalView`] and reconciles it on
//!   `Synced`, when both collections are from the same poll
//!
//! The producer exits when the receiving side is dropped. A poll is all or
//! nothing: if either collection read fails, the tick is logged and skipped
//! and the previous snapshots stay authoritative.
//!
//! Snapshots hold exactly the documents a fetch would return. Documents are
//! keyed by `(doc_id, ordinal)`, where `ordinal` numbers repeats of the same
//! id in store order, so duplicates stay separate entries. A document without
//! an id is kept under the empty id and makes [`LocalView::records`] fail the
//! same way the fetch path does.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arena_reconcile::adapter::{normalize_postings, normalize_verifications, AdapterError};
use arena_reconcile::TipsterRecords;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{doc_id, Collections, DocumentStore};

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// Document added or changed.
    Upsert {
        collection: String,
        doc_id: String,
        ordinal: u32,
        body: Value,
    },
    /// Document no longer returned for this tipster.
    Remove {
        collection: String,
        doc_id: String,
        ordinal: u32,
    },
    /// All changes from one poll have been sent. Always sent after the first
    /// poll, afterwards only when the poll produced changes.
    Synced,
}

impl ChangeEvent {
    pub fn collection(&self) -> Option<&str> {
        match self {
            ChangeEvent::Upsert { collection, .. } | ChangeEvent::Remove { collection, .. } => {
                Some(collection)
            }
            ChangeEvent::Synced => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedSpec {
    pub collections: Collections,
    pub tipster_id: String,
    pub interval: Duration,
}

/// Position of a document within one collection's poll. `doc_id` is empty
/// for documents without a usable id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct DocKey {
    doc_id: String,
    ordinal: u32,
}

type Snapshot = BTreeMap<DocKey, Value>;

/// Diff two snapshots of one collection. Output is ordered by doc id,
/// removals after upserts.
fn diff_snapshot(collection: &str, prev: &Snapshot, next: &Snapshot) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    for (key, body) in next {
        if prev.get(key) != Some(body) {
            events.push(ChangeEvent::Upsert {
                collection: collection.to_string(),
                doc_id: key.doc_id.clone(),
                ordinal: key.ordinal,
                body: body.clone(),
            });
        }
    }
    for key in prev.keys() {
        if !next.contains_key(key) {
            events.push(ChangeEvent::Remove {
                collection: collection.to_string(),
                doc_id: key.doc_id.clone(),
                ordinal: key.ordinal,
            });
        }
    }
    events
}

fn to_snapshot(collection: &str, docs: Vec<Value>) -> Snapshot {
    let mut snap = Snapshot::new();
    let mut seen: BTreeMap<String, u32> = BTreeMap::new();
    for doc in docs {
        let id = doc_id(&doc).unwrap_or_default().to_string();
        if id.is_empty() {
            warn!(collection, "document without id in change feed poll");
        }
        let next = seen.entry(id.clone()).or_insert(0);
        let ordinal = *next;
        *next += 1;
        if ordinal > 0 {
            warn!(collection, doc_id = %id, ordinal, "duplicate document id in change feed poll");
        }
        snap.insert(DocKey { doc_id: id, ordinal }, doc);
    }
    snap
}

/// Spawn the polling producer. The first poll emits every current document as
/// an upsert.
pub fn spawn_poll_feed(
    store: Arc<dyn DocumentStore>,
    spec: FeedSpec,
    tx: mpsc::Sender<ChangeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let cols = &spec.collections;
        let mut postings = Snapshot::new();
        let mut verifications = Snapshot::new();
        let mut first_sync = true;

        let mut ticker = tokio::time::interval(spec.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            store = store.name(),
            tipster_id = %spec.tipster_id,
            interval_ms = spec.interval.as_millis() as u64,
            "change feed started"
        );

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }

            let polled = tokio::try_join!(
                store.fetch_by_field(&cols.postings, &cols.posting_author_field, &spec.tipster_id),
                store.fetch_by_field(
                    &cols.verifications,
                    &cols.verification_author_field,
                    &spec.tipster_id
                ),
            );
            let (posting_docs, verification_docs) = match polled {
                Ok(docs) => docs,
                Err(e) => {
                    warn!(error = %e, "change feed poll failed; skipping tick");
                    continue;
                }
            };

            let next_postings = to_snapshot(&cols.postings, posting_docs);
            let next_verifications = to_snapshot(&cols.verifications, verification_docs);
            let mut events = diff_snapshot(&cols.postings, &postings, &next_postings);
            events.extend(diff_snapshot(
                &cols.verifications,
                &verifications,
                &next_verifications,
            ));
            postings = next_postings;
            verifications = next_verifications;

            if events.is_empty() && !first_sync {
                continue;
            }
            first_sync = false;
            debug!(events = events.len(), "change feed emitting");

            for ev in events.into_iter().chain(std::iter::once(ChangeEvent::Synced)) {
                if tx.send(ev).await.is_err() {
                    info!("change feed receiver dropped; stopping");
                    return;
                }
            }
        }
        info!("change feed receiver dropped; stopping");
    })
}

/// Consumer-side state rebuilt from [`ChangeEvent`]s.
#[derive(Debug, Clone)]
pub struct LocalView {
    tipster_id: String,
    collections: Collections,
    postings: Snapshot,
    verifications: Snapshot,
}

impl LocalView {
    pub fn new(tipster_id: impl Into<String>, collections: Collections) -> Self {
        Self {
            tipster_id: tipster_id.into(),
            collections,
            postings: Snapshot::new(),
            verifications: Snapshot::new(),
        }
    }

    fn target(&mut self, collection: &str) -> Option<&mut Snapshot> {
        if collection == self.collections.postings {
            Some(&mut self.postings)
        } else if collection == self.collections.verifications {
            Some(&mut self.verifications)
        } else {
            None
        }
    }

    /// Apply one event. Returns `true` if the view changed; `Synced` and
    /// events for other collections never change it.
    pub fn apply(&mut self, ev: &ChangeEvent) -> bool {
        let Some(target) = ev.collection().and_then(|c| self.target(c)) else {
            return false;
        };
        match ev {
            ChangeEvent::Upsert {
                doc_id,
                ordinal,
                body,
                ..
            } => {
                let key = DocKey {
                    doc_id: doc_id.clone(),
                    ordinal: *ordinal,
                };
                target.insert(key, body.clone()).as_ref() != Some(body)
            }
            ChangeEvent::Remove {
                doc_id, ordinal, ..
            } => {
                let key = DocKey {
                    doc_id: doc_id.clone(),
                    ordinal: *ordinal,
                };
                target.remove(&key).is_some()
            }
            ChangeEvent::Synced => false,
        }
    }

    pub fn len(&self) -> usize {
        self.postings.len() + self.verifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode the current view into reconcilable records. Fails on the same
    /// documents the fetch path rejects.
    pub fn records(&self) -> Result<TipsterRecords, AdapterError> {
        let posting_docs: Vec<Value> = self.postings.values().cloned().collect();
        let verification_docs: Vec<Value> = self.verifications.values().cloned().collect();
        Ok(TipsterRecords {
            tipster_id: self.tipster_id.clone(),
            postings: normalize_postings(&posting_docs)?,
            verifications: normalize_verifications(&verification_docs)?,
        })
    }
}
