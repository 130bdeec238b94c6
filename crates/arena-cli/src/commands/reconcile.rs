//! `arena reconcile`: one fetch, one report.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use arena_audit::AuditWriter;
use arena_reconcile::reconcile;
use arena_store::fetch_tipster_records;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{build_store, collections, fetch_options, load_config, parse_format, print_report};

pub struct ReconcileArgs {
    pub tipster: String,
    pub config_paths: Vec<String>,
    pub format: Option<String>,
    pub audit_log: Option<String>,
    pub fail_on_drift: bool,
}

pub async fn run(args: ReconcileArgs) -> Result<ExitCode> {
    let loaded = load_config(&args.config_paths)?;
    let cfg = &loaded.cfg;
    let format = parse_format(args.format.as_deref(), cfg)?;

    let store = build_store(cfg).await?;
    let records = fetch_tipster_records(
        store.as_ref(),
        &collections(cfg),
        &args.tipster,
        &fetch_options(cfg),
    )
    .await
    .with_context(|| format!("fetch records for tipster '{}'", args.tipster.trim()))?;

    let report = reconcile(&records);
    let run_id = Uuid::new_v4();
    info!(
        %run_id,
        tipster_id = %report.tipster_id,
        outcome = report.outcome.as_str(),
        mismatches = report.mismatches.len(),
        link_diffs = report.link_diffs.len(),
        warnings = report.warnings.len(),
        "reconcile complete"
    );

    print_report(&report, format)?;

    let audit_path = args
        .audit_log
        .map(PathBuf::from)
        .or_else(|| cfg.report.audit_log.clone());
    if let Some(path) = audit_path {
        let mut writer = AuditWriter::resume(&path, true)?;
        let payload = json!({
            "config_hash": loaded.raw.config_hash,
            "report": serde_json::to_value(&report).context("serialize report failed")?,
        });
        let ev = writer.append(run_id, &report.tipster_id, "RECONCILE_REPORT", payload)?;
        info!(path = %path.display(), event_id = %ev.event_id, "audit event written");
    }

    if args.fail_on_drift && !report.is_clean() {
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}
