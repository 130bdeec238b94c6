//! Command handlers for the `arena` binary.
//!
//! Config loading and store construction are shared by `reconcile` and
//! `watch` and live here.

pub mod reconcile;
pub mod watch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arena_config::{
    secrets::resolve_secrets, ArenaConfig, LoadedConfig, ReportFormat, StoreBackend,
    UnusedKeyPolicy,
};
use arena_reconcile::{render_text, ReconcileReport};
use arena_store::{
    Collections, DocumentStore, FetchOptions, HttpDocumentStore, MemoryStore, PgDocumentStore,
    RetryPolicy,
};
use tracing::{info, warn};

pub struct Loaded {
    pub raw: LoadedConfig,
    pub cfg: ArenaConfig,
}

/// Merge config layers, warn on unused keys and build the typed view.
pub fn load_config(paths: &[String]) -> Result<Loaded> {
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let raw = arena_config::load_layered_yaml(&path_refs)?;

    let unused = arena_config::report_unused_keys(&raw.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &unused.unused_leaf_pointers {
        warn!(key = %ptr, "config key is not used");
    }

    let cfg = ArenaConfig::from_json(&raw.config_json).context("invalid arena config")?;
    info!(
        config_hash = %raw.config_hash,
        project_id = %cfg.project_id,
        backend = cfg.store.backend.as_str(),
        "config loaded"
    );
    Ok(Loaded { raw, cfg })
}

pub fn parse_format(flag: Option<&str>, cfg: &ArenaConfig) -> Result<ReportFormat> {
    match flag {
        None => Ok(cfg.report.format),
        Some(s) => ReportFormat::parse(s)
            .with_context(|| format!("invalid --format '{s}'. expected one of: text | json")),
    }
}

pub fn collections(cfg: &ArenaConfig) -> Collections {
    Collections {
        postings: cfg.store.postings_collection.clone(),
        verifications: cfg.store.verifications_collection.clone(),
        posting_author_field: cfg.store.posting_author_field.clone(),
        verification_author_field: cfg.store.verification_author_field.clone(),
    }
}

pub fn fetch_options(cfg: &ArenaConfig) -> FetchOptions {
    FetchOptions {
        deadline: cfg.fetch.deadline_ms.map(Duration::from_millis),
        retry: RetryPolicy {
            max_attempts: cfg.fetch.max_attempts,
            initial_backoff: Duration::from_millis(cfg.fetch.initial_backoff_ms),
            max_backoff: Duration::from_millis(cfg.fetch.max_backoff_ms),
        },
    }
}

/// Construct the configured backend. Credentials are resolved here, once.
pub async fn build_store(cfg: &ArenaConfig) -> Result<Arc<dyn DocumentStore>> {
    let secrets = resolve_secrets(cfg)?;

    let store: Arc<dyn DocumentStore> = match cfg.store.backend {
        StoreBackend::File => {
            let path = cfg
                .store
                .path
                .as_ref()
                .context("store.path is required for the file backend")?;
            Arc::new(MemoryStore::from_json_file(path)?)
        }
        StoreBackend::Http => {
            let base_url = cfg
                .store
                .base_url
                .clone()
                .context("store.base_url is required for the http backend")?;
            Arc::new(HttpDocumentStore::new(
                base_url,
                cfg.project_id.clone(),
                secrets.store_token.clone(),
            ))
        }
        StoreBackend::Postgres => {
            let url = secrets
                .database_url
                .as_deref()
                .context("database url was not resolved")?;
            let pool = arena_store::pg::connect(url).await?;
            Arc::new(PgDocumentStore::new(pool))
        }
    };
    Ok(store)
}

pub fn print_report(report: &ReconcileReport, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Text => print!("{}", render_text(report)),
        ReportFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(report).context("serialize report failed")?
        ),
    }
    Ok(())
}
