use serde::Deserialize;
use serde_json::Value;

use crate::{DocumentStore, StoreError};

/// REST-backed document store.
///
/// `GET {base_url}/v1/projects/{project_id}/collections/{collection}/documents?field=..&value=..`
/// answering `{ "documents": [ ... ] }`.
///
/// The bearer token is resolved by the caller (see `arena-config` secrets) and
/// passed in; it is never logged.
#[derive(Clone)]
pub struct HttpDocumentStore {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    token: Option<String>,
}

impl std::fmt::Debug for HttpDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDocumentStore")
            .field("base_url", &self.base_url)
            .field("project_id", &self.project_id)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl HttpDocumentStore {
    pub fn new(base_url: String, project_id: String, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            project_id,
            token,
        }
    }

    fn documents_url(&self, collection: &str) -> String {
        format!(
            "{}/v1/projects/{}/collections/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            collection
        )
    }
}

#[derive(Debug, Deserialize)]
struct DocumentsResponse {
    #[serde(default)]
    documents: Vec<Value>,
}

/// Keep error bodies short enough for a log line.
fn truncate(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}

#[async_trait::async_trait]
impl DocumentStore for HttpDocumentStore {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let mut req = self
            .http
            .get(self.documents_url(collection))
            .query(&[("field", field), ("value", value)]);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: truncate(body, 200),
            });
        }

        let body: DocumentsResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("documents response: {e}")))?;
        Ok(body.documents)
    }
}

// -----------------
// Tests (no network)
// -----------------
