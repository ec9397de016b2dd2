//! `csync history` and `csync restore`.

use anyhow::Result;

use catalog_sync_core::store::HistoryStore;
use catalog_sync_core::{RestoreReport, SyncError};

use crate::config::Config;
use crate::report::{render_history_entry, render_history_list, render_restore};
use crate::sqlite_store::SqliteStore;

pub async fn run_history_list(config: &Config, json: bool) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let entries = store.list_history().await?;
    store.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print!("{}", render_history_list(&entries));
    }
    Ok(())
}

pub async fn run_history_show(config: &Config, id: &str, json: bool) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let entry = store.get_history(id).await?;
    store.close().await;

    let entry = entry.ok_or_else(|| SyncError::HistoryNotFound(id.to_string()))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print!("{}", render_history_entry(&entry));
    }
    Ok(())
}

/// Restore the catalog to the state recorded before history entry `id`.
pub async fn restore_history(config: &Config, id: &str) -> Result<RestoreReport> {
    let store = SqliteStore::open(config).await?;
    let result = config.restore_engine().restore(&store, id).await;
    store.close().await;
    Ok(result?)
}

pub async fn run_restore(config: &Config, id: &str, json: bool) -> Result<()> {
    let report = restore_history(config, id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_restore(&report));
    }
    Ok(())
}
