//! `csync reconcile`: read a feed file and run it against the catalog.

use anyhow::Result;
use std::path::Path;

use catalog_sync_core::models::ReconciliationReport;
use catalog_sync_core::{RunOptions, RunOutcome};

use crate::config::Config;
use crate::feed;
use crate::report::render_report;
use crate::sqlite_store::SqliteStore;

/// Reconcile the feed at `path` against the configured catalog and return
/// the outcome. Nothing is printed.
pub async fn reconcile_file(
    config: &Config,
    path: &Path,
    sync_stock: bool,
    dry_run: bool,
) -> Result<RunOutcome> {
    let rows = feed::read_feed(path)?;
    let reconciler = config.reconciler()?;
    let store = SqliteStore::open(config).await?;

    let options = RunOptions {
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        sync_stock,
        dry_run,
    };
    let outcome = reconciler.run(&store, &rows, &options).await;
    store.close().await;
    Ok(outcome?)
}

pub async fn run_reconcile(
    config: &Config,
    path: &Path,
    sync_stock: bool,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let outcome = reconcile_file(config, path, sync_stock, dry_run).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&JsonOutcome::from(&outcome))?);
    } else {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        print!(
            "{}",
            render_report(&outcome.report, &file_name, dry_run, outcome.history_id.as_deref())
        );
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct JsonOutcome<'a> {
    history_id: Option<&'a str>,
    feed_digest: &'a str,
    report: &'a ReconciliationReport,
}

impl<'a> From<&'a RunOutcome> for JsonOutcome<'a> {
    fn from(outcome: &'a RunOutcome) -> Self {
        Self {
            history_id: outcome.history_id.as_deref(),
            feed_digest: &outcome.feed_digest,
            report: &outcome.report,
        }
    }
}
