//! Bounded audit log.
//!
//! Each applied run writes one [`HistoryEntry`] holding capped detail lists
//! and the full catalog as it was before the run. Only the most recent
//! entries are retained; older ones are pruned right after each insert.

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{CatalogEntry, HistoryEntry, ReconciliationReport};
use crate::store::HistoryStore;

/// Default number of history entries kept.
pub const DEFAULT_RETAIN: usize = 5;
pub const MAX_CHANGES: usize = 100;
pub const MAX_INSERTED: usize = 50;
pub const MAX_ZEROED: usize = 50;

/// Build a history entry from a finished run. Detail lists are truncated to
/// their caps; `snapshot_before` is stored in full.
pub fn build_entry(
    file_name: &str,
    snapshot_before: &[CatalogEntry],
    report: &ReconciliationReport,
    sync_stock_enabled: bool,
    feed_digest: &str,
) -> HistoryEntry {
    HistoryEntry {
        id: Uuid::new_v4().to_string(),
        file_name: file_name.to_string(),
        uploaded_at: Utc::now(),
        stats: report.stats.clone(),
        changes: report.changes.iter().take(MAX_CHANGES).cloned().collect(),
        inserted_products: report.created.iter().take(MAX_INSERTED).cloned().collect(),
        zeroed_products: report.zeroed.iter().take(MAX_ZEROED).cloned().collect(),
        snapshot_before: snapshot_before.to_vec(),
        sync_stock_enabled,
        feed_digest: feed_digest.to_string(),
        restored_at: None,
    }
}

/// Writes history entries and enforces the retention bound.
#[derive(Debug, Clone, Copy)]
pub struct HistoryLog {
    retain: usize,
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_RETAIN)
    }
}

impl HistoryLog {
    pub fn new(retain: usize) -> Self {
        Self {
            retain: retain.max(1),
        }
    }

    pub fn retain(&self) -> usize {
        self.retain
    }

    /// Insert `entry`, then prune. Returns the number of entries pruned.
    ///
    /// Only the insert can fail the call. Once the entry is stored it is
    /// restorable, so a failed prune is logged and reported as zero pruned.
    pub async fn record<S: HistoryStore + ?Sized>(&self, store: &S, entry: &HistoryEntry) -> Result<usize> {
        store.insert_history(entry).await?;
        tracing::info!(history_id = %entry.id, file = %entry.file_name, "history entry written");
        match self.prune(store).await {
            Ok(pruned) => Ok(pruned),
            Err(e) => {
                tracing::warn!(history_id = %entry.id, error = %e, "failed to prune history");
                Ok(0)
            }
        }
    }

    /// Delete everything beyond the `retain` most recent entries.
    pub async fn prune<S: HistoryStore + ?Sized>(&self, store: &S) -> Result<usize> {
        let all = store.list_history().await?;
        let mut pruned = 0;
        for old in all.iter().skip(self.retain) {
            store.delete_history(&old.id).await?;
            tracing::debug!(history_id = %old.id, "pruned history entry");
            pruned += 1;
        }
        Ok(pruned)
    }
}
