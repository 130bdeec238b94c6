//! `arena watch`: change feed in, a fresh report out whenever it differs.

use std::time::Duration;

use anyhow::Result;
use arena_reconcile::{reconcile, ReconcileReport};
use arena_store::{spawn_poll_feed, ChangeEvent, FeedSpec, LocalView};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{build_store, collections, load_config, print_report};

pub struct WatchArgs {
    pub tipster: String,
    pub config_paths: Vec<String>,
    pub interval_ms: Option<u64>,
    pub max_reports: Option<usize>,
}

pub async fn run(args: WatchArgs) -> Result<()> {
    let loaded = load_config(&args.config_paths)?;
    let cfg = &loaded.cfg;

    let tipster = args.tipster.trim().to_string();
    anyhow::ensure!(!tipster.is_empty(), "--tipster must be a non-empty id");

    let interval_ms = args.interval_ms.unwrap_or(cfg.watch.interval_ms).max(1);
    let store = build_store(cfg).await?;
    let spec = FeedSpec {
        collections: collections(cfg),
        tipster_id: tipster.clone(),
        interval: Duration::from_millis(interval_ms),
    };

    let (tx, mut rx) = mpsc::channel(256);
    let feed = spawn_poll_feed(store, spec.clone(), tx);

    let mut view = LocalView::new(tipster, spec.collections);
    let mut last: Option<ReconcileReport> = None;
    let mut dirty = false;
    let mut printed = 0usize;

    loop {
        let ev = tokio::select! {
            ev = rx.recv() => ev,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; stopping watch");
                break;
            }
        };
        let Some(ev) = ev else {
            warn!("change feed ended");
            break;
        };

        if ev != ChangeEvent::Synced {
            dirty |= view.apply(&ev);
            continue;
        }
        if !dirty && last.is_some() {
            continue;
        }
        dirty = false;

        let records = match view.records() {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "local view has an undecodable document; waiting for next change");
                last = None;
                continue;
            }
        };
        let report = reconcile(&records);
        if last.as_ref() == Some(&report) {
            continue;
        }

        print_report(&report, cfg.report.format)?;
        last = Some(report);
        printed += 1;

        if args.max_reports.is_some_and(|max| printed >= max) {
            break;
        }
    }

    feed.abort();
    let _ = feed.await;
    Ok(())
}
