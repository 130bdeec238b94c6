//! `arena watch` against a file-backed store.
//!
//! GREEN when:
//! - the first complete poll produces one report
//! - `--max-reports 1` ends the process cleanly after it

mod common;

use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn watch_prints_initial_report_and_stops() {
    let fx = common::write_fixture("");
    Command::cargo_bin("arena")
        .unwrap()
        .env("RUST_LOG", "warn")
        .args([
            "watch",
            "--tipster",
            "drifty",
            "--config",
            &fx.config_arg(),
            "--interval-ms",
            "10",
            "--max-reports",
            "1",
        ])
        .timeout(Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("reconcile tipster=drifty outcome=DRIFT"))
        .stdout(predicate::str::contains("postings=5 verifications=4"));
}
