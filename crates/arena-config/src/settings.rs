//! Typed view over the merged config JSON.
//!
//! Every pointer read here must be listed in `CONSUMED_POINTERS`.

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde_json::Value;

pub const DEFAULT_DATABASE_URL_ENV: &str = "ARENA_DATABASE_URL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// JSON fixture file loaded into memory.
    File,
    Http,
    Postgres,
}

impl StoreBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Some(Self::File),
            "http" => Some(Self::Http),
            "postgres" => Some(Self::Postgres),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Http => "http",
            Self::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl ReportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub path: Option<PathBuf>,
    pub base_url: Option<String>,
    /// Env var NAME holding the HTTP bearer token.
    pub token_env: Option<String>,
    /// Env var NAME holding the Postgres URL.
    pub database_url_env: String,
    pub postings_collection: String,
    pub verifications_collection: String,
    pub posting_author_field: String,
    pub verification_author_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub deadline_ms: Option<u64>,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            deadline_ms: None,
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportSettings {
    pub format: ReportFormat,
    pub audit_log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    pub interval_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self { interval_ms: 5_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    pub project_id: String,
    pub store: StoreSettings,
    pub fetch: FetchSettings,
    pub report: ReportSettings,
    pub watch: WatchSettings,
}

// ---------------------------------------------------------------------------
// Pointer readers
// ---------------------------------------------------------------------------

/// Non-blank string at `pointer`. Present but not a string is an error.
fn read_str(config: &Value, pointer: &str) -> Result<Option<String>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok((!t.is_empty()).then(|| t.to_string()))
        }
        Some(other) => bail!("CONFIG_INVALID {pointer}: expected string, got {other}"),
    }
}

fn read_str_or(config: &Value, pointer: &str, default: &str) -> Result<String> {
    Ok(read_str(config, pointer)?.unwrap_or_else(|| default.to_string()))
}

/// Non-negative integer at `pointer`.
fn read_u64(config: &Value, pointer: &str) -> Result<Option<u64>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(n) => Ok(Some(n)),
            None => bail!("CONFIG_INVALID {pointer}: expected non-negative integer, got {v}"),
        },
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl ArenaConfig {
    /// Build from merged config JSON (see `load_layered_yaml`), applying
    /// defaults and cross-field validation.
    pub fn from_json(config: &Value) -> Result<Self> {
        let Some(project_id) = read_str(config, "/project_id")? else {
            bail!("CONFIG_INVALID /project_id: required");
        };

        let store = parse_store(config)?;
        let fetch = parse_fetch(config)?;

        let format = match read_str(config, "/report/format")? {
            None => ReportFormat::default(),
            Some(s) => match ReportFormat::parse(&s) {
                Some(f) => f,
                None => bail!("CONFIG_INVALID /report/format: '{s}' (expected text | json)"),
            },
        };
        let report = ReportSettings {
            format,
            audit_log: read_str(config, "/report/audit_log")?.map(PathBuf::from),
        };

        let interval_ms = read_u64(config, "/watch/interval_ms")?
            .unwrap_or(WatchSettings::default().interval_ms);
        if interval_ms == 0 {
            bail!("CONFIG_INVALID /watch/interval_ms: must be > 0");
        }

        Ok(Self {
            project_id,
            store,
            fetch,
            report,
            watch: WatchSettings { interval_ms },
        })
    }
}

fn parse_store(config: &Value) -> Result<StoreSettings> {
    let backend = match read_str(config, "/store/backend")? {
        None => bail!("CONFIG_INVALID /store/backend: required (file | http | postgres)"),
        Some(s) => match StoreBackend::parse(&s) {
            Some(b) => b,
            None => bail!("CONFIG_INVALID /store/backend: '{s}' (expected file | http | postgres)"),
        },
    };

    let path = read_str(config, "/store/path")?.map(PathBuf::from);
    let base_url = read_str(config, "/store/base_url")?;

    match backend {
        StoreBackend::File if path.is_none() => {
            bail!("CONFIG_INVALID /store/path: required when store.backend=file")
        }
        StoreBackend::Http if base_url.is_none() => {
            bail!("CONFIG_INVALID /store/base_url: required when store.backend=http")
        }
        _ => {}
    }

    let postings_collection = read_str_or(config, "/store/collections/postings", "tips")?;
    let verifications_collection =
        read_str_or(config, "/store/collections/verifications", "tip_verifications")?;
    if postings_collection.trim() == verifications_collection.trim() {
        bail!(
            "CONFIG_INVALID /store/collections/verifications: must differ from \
             /store/collections/postings ('{postings_collection}')"
        );
    }

    Ok(StoreSettings {
        backend,
        path,
        base_url,
        token_env: read_str(config, "/store/token_env")?,
        database_url_env: read_str_or(config, "/store/database_url_env", DEFAULT_DATABASE_URL_ENV)?,
        postings_collection,
        verifications_collection,
        posting_author_field: read_str_or(config, "/store/fields/posting_author", "authorId")?,
        verification_author_field: read_str_or(
            config,
            "/store/fields/verification_author",
            "authorId",
        )?,
    })
}

fn parse_fetch(config: &Value) -> Result<FetchSettings> {
    let d = FetchSettings::default();

    let deadline_ms = read_u64(config, "/fetch/deadline_ms")?;
    if deadline_ms == Some(0) {
        bail!("CONFIG_INVALID /fetch/deadline_ms: must be > 0 when set");
    }

    let max_attempts = match read_u64(config, "/fetch/max_attempts")? {
        None => d.max_attempts,
        Some(0) => bail!("CONFIG_INVALID /fetch/max_attempts: must be >= 1"),
        Some(n) => match u32::try_from(n) {
            Ok(n) => n,
            Err(_) => bail!("CONFIG_INVALID /fetch/max_attempts: {n} is out of range"),
        },
    };

    let initial_backoff_ms =
        read_u64(config, "/fetch/initial_backoff_ms")?.unwrap_or(d.initial_backoff_ms);
    let max_backoff_ms = read_u64(config, "/fetch/max_backoff_ms")?.unwrap_or(d.max_backoff_ms);
    if max_backoff_ms < initial_backoff_ms {
        bail!(
            "CONFIG_INVALID /fetch/max_backoff_ms: {max_backoff_ms} is below initial_backoff_ms {initial_backoff_ms}"
        );
    }

    Ok(FetchSettings {
        deadline_ms,
        max_attempts,
        initial_backoff_ms,
        max_backoff_ms,
    })
}
