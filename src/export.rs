//! Export the catalog as JSON.
//!
//! Produces an array of catalog entries in store order, the same shape
//! snapshots use in history entries.

use anyhow::{Context, Result};
use std::path::Path;

use catalog_sync_core::store::CatalogStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

/// Export the catalog as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let entries = store.list_entries().await?;
    store.close().await;

    let json = serde_json::to_string_pretty(&entries)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} entries to {}", entries.len(), path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}
