//! Shared fixture for CLI scenarios: a JSON store export plus a config that
//! points the `file` backend at it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub config: PathBuf,
}

impl Fixture {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config_arg(&self) -> String {
        self.config.to_string_lossy().to_string()
    }
}

fn posting(id: &str, author: &str, status: &str) -> Value {
    json!({
        "id": id, "authorId": author, "sport": "football", "title": id,
        "outcomeStatus": status, "createdAt": "2024-03-01T12:00:00Z"
    })
}

fn verification(id: &str, posting_id: &str, author: &str, status: &str) -> Value {
    json!({
        "id": id, "postingId": posting_id, "authorId": author, "status": status,
        "decidedBy": "mod-1", "decidedAt": "2024-03-02T09:00:00Z"
    })
}

/// `clean`: two wins, one loss, one pending, all backed.
/// `drifty`: five losses, one never verified.
pub fn store_export() -> Value {
    let mut tips = vec![
        posting("c1", "clean", "win"),
        posting("c2", "clean", "win"),
        posting("c3", "clean", "loss"),
        posting("c4", "clean", "pending"),
    ];
    let mut verifications = vec![
        verification("cv1", "c1", "clean", "win"),
        verification("cv2", "c2", "clean", "win"),
        verification("cv3", "c3", "clean", "loss"),
    ];
    for i in 0..5 {
        tips.push(posting(&format!("d{i}"), "drifty", "loss"));
        if i < 4 {
            verifications.push(verification(&format!("dv{i}"), &format!("d{i}"), "drifty", "loss"));
        }
    }
    json!({ "tips": tips, "tip_verifications": verifications })
}

pub fn write_fixture(extra_yaml: &str) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = dir.path().join("store.json");
    std::fs::write(&store, serde_json::to_string_pretty(&store_export()).unwrap()).unwrap();

    let config = dir.path().join("arena.yaml");
    let yaml = format!(
        "project_id: \"arena-test\"\nstore:\n  backend: \"file\"\n  path: \"{}\"\nfetch:\n  max_attempts: 1\n{}",
        yaml_path(&store),
        extra_yaml
    );
    std::fs::write(&config, yaml).unwrap();

    Fixture { dir, config }
}

fn yaml_path(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}
