//! Config hash stability.
//!
//! GREEN when:
//! - the same inputs hash identically across calls
//! - key order within a YAML document does not change the hash
//! - a changed value changes the hash
//! - an overlay layer overrides the base and is reflected in the hash

use arena_config::{load_layered_yaml, load_layered_yaml_from_strings};

const BASE_YAML: &str = r#"
project_id: "arena-prod"
store:
  backend: "http"
  base_url: "https://store.arena.example"
  token_env: "ARENA_STORE_TOKEN"
fetch:
  max_attempts: 3
  deadline_ms: 10000
"#;

const BASE_YAML_REORDERED: &str = r#"
fetch:
  deadline_ms: 10000
  max_attempts: 3
store:
  token_env: "ARENA_STORE_TOKEN"
  base_url: "https://store.arena.example"
  backend: "http"
project_id: "arena-prod"
"#;

const OVERLAY_YAML: &str = r#"
fetch:
  max_attempts: 5
report:
  format: "json"
"#;

#[test]
fn hash_is_stable_across_calls() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.config_hash.len(), 64);
    assert!(a.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.canonical_json, b.canonical_json);
    assert_eq!(a.config_hash, b.config_hash);
}

#[test]
fn changed_value_changes_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let changed = BASE_YAML.replace("max_attempts: 3", "max_attempts: 4");
    let b = load_layered_yaml_from_strings(&[changed.as_str()]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base_deeply() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_ne!(base.config_hash, merged.config_hash);
    let j = &merged.config_json;
    assert_eq!(j.pointer("/fetch/max_attempts").unwrap(), 5);
    // Sibling keys of an overridden object survive.
    assert_eq!(j.pointer("/fetch/deadline_ms").unwrap(), 10000);
    assert_eq!(j.pointer("/report/format").unwrap(), "json");
    assert_eq!(j.pointer("/store/backend").unwrap(), "http");
}

#[test]
fn file_layers_match_string_layers() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let overlay = dir.path().join("prod.yaml");
    std::fs::write(&base, BASE_YAML).unwrap();
    std::fs::write(&overlay, OVERLAY_YAML).unwrap();

    let from_files = load_layered_yaml(&[
        base.to_str().unwrap(),
        overlay.to_str().unwrap(),
    ])
    .unwrap();
    let from_strings = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(from_files.config_hash, from_strings.config_hash);
}

#[test]
fn missing_file_names_the_path() {
    let err = load_layered_yaml(&["/no/such/arena.yaml"]).unwrap_err();
    assert!(format!("{err:#}").contains("/no/such/arena.yaml"), "{err:#}");
}
