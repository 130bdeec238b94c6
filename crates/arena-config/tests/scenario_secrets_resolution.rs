//! Store credential resolution.
//!
//! Sentinel env var names below are never set anywhere, so no test mutates
//! the process environment.
//!
//! GREEN when:
//! - the file backend needs nothing
//! - postgres fails closed naming the missing URL variable
//! - http with `token_env` fails closed naming the variable; without it, no token
//! - `Debug` on resolved secrets never prints values

use arena_config::secrets::{resolve_secrets, ResolvedSecrets};
use arena_config::{load_layered_yaml_from_strings, ArenaConfig};

fn cfg(yaml: &str) -> ArenaConfig {
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("yaml loads");
    ArenaConfig::from_json(&loaded.config_json).expect("config is valid")
}

#[test]
fn file_backend_requires_nothing() {
    let c = cfg("project_id: p\nstore:\n  backend: file\n  path: tips.json\n");
    let s = resolve_secrets(&c).unwrap();
    assert!(s.store_token.is_none());
    assert!(s.database_url.is_none());
}

#[test]
fn postgres_fails_closed_naming_var() {
    let c = cfg(
        "project_id: p\nstore:\n  backend: postgres\n  database_url_env: ARENA_SENTINEL_DB_URL_UNSET_01\n",
    );
    let msg = resolve_secrets(&c).unwrap_err().to_string();
    assert!(msg.contains("SECRETS_MISSING"), "{msg}");
    assert!(msg.contains("backend=postgres"), "{msg}");
    assert!(msg.contains("ARENA_SENTINEL_DB_URL_UNSET_01"), "{msg}");
}

#[test]
fn http_token_env_fails_closed_naming_var() {
    let c = cfg(
        "project_id: p\nstore:\n  backend: http\n  base_url: https://store.example\n  token_env: ARENA_SENTINEL_TOKEN_UNSET_02\n",
    );
    let msg = resolve_secrets(&c).unwrap_err().to_string();
    assert!(msg.contains("backend=http"), "{msg}");
    assert!(msg.contains("ARENA_SENTINEL_TOKEN_UNSET_02"), "{msg}");
}

#[test]
fn http_without_token_env_is_anonymous() {
    let c = cfg("project_id: p\nstore:\n  backend: http\n  base_url: https://store.example\n");
    assert!(resolve_secrets(&c).unwrap().store_token.is_none());
}

#[test]
fn debug_is_redacted() {
    let s = ResolvedSecrets {
        store_token: Some("tok-very-secret".into()),
        database_url: Some("postgres://u:pw@h/db".into()),
    };
    let dbg = format!("{s:?}");
    assert!(!dbg.contains("tok-very-secret"));
    assert!(!dbg.contains("pw@h"));
    assert!(dbg.contains("<REDACTED>"));
}
