//! In-process document store.
//!
//! Backs the `file` store backend (JSON fixture exported from the managed
//! store) and every test that needs a store without a network.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::{doc_id, DocumentStore, StoreError};

/// Collections of JSON documents keyed by collection name.
///
/// Fixture format: `{ "<collection>": [ { ...doc... }, ... ], ... }`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert for fixtures assembled in code.
    pub fn with_docs(mut self, collection: &str, docs: impl IntoIterator<Item = Value>) -> Self {
        self.collections
            .get_mut()
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, StoreError> {
        let parsed: BTreeMap<String, Vec<Value>> = serde_json::from_str(raw)
            .map_err(|e| StoreError::Decode(format!("fixture must map collection -> [docs]: {e}")))?;
        Ok(Self {
            collections: RwLock::new(parsed),
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("read store fixture {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Insert or replace (by `id`) a document.
    pub async fn upsert(&self, collection: &str, doc: Value) {
        let mut guard = self.collections.write().await;
        let docs = guard.entry(collection.to_string()).or_default();
        let id = doc_id(&doc).map(str::to_string);
        match id.and_then(|id| docs.iter().position(|d| doc_id(d) == Some(id.as_str()))) {
            Some(i) => docs[i] = doc,
            None => docs.push(doc),
        }
    }

    /// Remove a document by `id`. Returns `true` if something was removed.
    pub async fn remove(&self, collection: &str, id: &str) -> bool {
        let mut guard = self.collections.write().await;
        let Some(docs) = guard.get_mut(collection) else {
            return false;
        };
        let before = docs.len();
        docs.retain(|d| doc_id(d) != Some(id));
        docs.len() != before
    }
}

/// Field match by trimmed string form: `" t1 "` matches `"t1"`, `42` matches `"42"`.
fn field_matches(doc: &Value, field: &str, value: &str) -> bool {
    let value = value.trim();
    match doc.get(field) {
        Some(Value::String(s)) => s.trim() == value,
        Some(Value::Number(n)) => n.to_string() == value,
        Some(Value::Bool(b)) => b.to_string() == value,
        _ => false,
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| field_matches(d, field, value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
