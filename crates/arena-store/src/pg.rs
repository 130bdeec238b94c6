//! Postgres-backed document store.
//!
//! Documents are stored verbatim as `jsonb` in a single `documents` table
//! keyed by `(collection, doc_id)`; see `migrations/`.

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{DocumentStore, StoreError};

pub const ENV_DB_URL: &str = "ARENA_DATABASE_URL";

/// Connect to Postgres using `url`.
pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Connect to Postgres using ARENA_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Insert or replace one document.
pub async fn upsert_document(
    pool: &PgPool,
    collection: &str,
    doc_id: &str,
    body: &Value,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into documents (collection, doc_id, body)
        values ($1, $2, $3)
        on conflict (collection, doc_id) do update set
          body = excluded.body,
          updated_at = now()
        "#,
    )
    .bind(collection)
    .bind(doc_id)
    .bind(body)
    .execute(pool)
    .await
    .context("upsert_document failed")?;
    Ok(())
}

/// Delete one document. Returns `true` if a row was removed.
pub async fn delete_document(pool: &PgPool, collection: &str, doc_id: &str) -> Result<bool> {
    let res = sqlx::query("delete from documents where collection = $1 and doc_id = $2")
        .bind(collection)
        .bind(doc_id)
        .execute(pool)
        .await
        .context("delete_document failed")?;
    Ok(res.rows_affected() > 0)
}

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl DocumentStore for PgDocumentStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn fetch_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<Value>, StoreError> {
        // `->>` compares the text form, matching the other backends.
        let rows: Vec<(Value,)> = sqlx::query_as(
            r#"
            select body
            from documents
            where collection = $1
              and body ->> $2 = $3
            order by doc_id
            "#,
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(rows.into_iter().map(|(body,)| body).collect())
    }
}
