//! Store credential resolution.
//!
//! Config holds env var NAMES only. [`resolve_secrets`] reads them once at
//! startup and the result is handed to store constructors; nothing else in the
//! workspace calls `std::env::var` for credentials.
//!
//! | backend  | required                                   |
//! |----------|--------------------------------------------|
//! | file     | nothing                                    |
//! | http     | `store.token_env` var, if `token_env` set  |
//! | postgres | `store.database_url_env` var               |
//!
//! Errors name the missing variable, never a value. `Debug` redacts values.

use anyhow::{bail, Result};

use crate::{ArenaConfig, StoreBackend};

#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Bearer token for the HTTP store.
    pub store_token: Option<String>,
    /// Postgres connection URL.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("store_token", &self.store_token.as_ref().map(|_| "<REDACTED>"))
            .field("database_url", &self.database_url.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// `None` if unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn require_env(backend: StoreBackend, var_name: &str, what: &str) -> Result<String> {
    match resolve_env(var_name) {
        Some(v) => Ok(v),
        None => bail!(
            "SECRETS_MISSING backend={}: required env var '{}' ({}) is not set or empty",
            backend.as_str(),
            var_name,
            what,
        ),
    }
}

pub fn resolve_secrets(cfg: &ArenaConfig) -> Result<ResolvedSecrets> {
    let backend = cfg.store.backend;
    let mut out = ResolvedSecrets::default();

    match backend {
        StoreBackend::File => {}
        StoreBackend::Http => {
            if let Some(var) = &cfg.store.token_env {
                out.store_token = Some(require_env(backend, var, "store bearer token")?);
            }
        }
        StoreBackend::Postgres => {
            out.database_url = Some(require_env(
                backend,
                &cfg.store.database_url_env,
                "database url",
            )?);
        }
    }

    Ok(out)
}
