//! Point-in-time restore from a history entry.
//!
//! Writes every entry of a [`HistoryEntry`]'s `snapshot_before` back into the
//! catalog, then stamps `restored_at`. Entries with a stable id are matched
//! by id. Entries carrying a synthetic id are matched by `modelRef + color`,
//! since an earlier restore or a manual edit may have re-keyed them.
//!
//! Entries created by the restored run are not in the snapshot and are left
//! as they are; restore never deletes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::history::{build_entry, HistoryLog};
use crate::index::composite_key;
use crate::models::{CatalogEntry, EntryPatch, ReconciliationReport};
use crate::store::{with_lease, CatalogStore, HistoryStore};

/// One snapshot entry restore could not write back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreIssue {
    pub id: String,
    pub model_ref: String,
    pub color: String,
    pub message: String,
}

/// Outcome of one restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub history_id: String,
    /// Existing entries overwritten with their snapshot values.
    pub restored: usize,
    /// Entries missing from the catalog and inserted again.
    pub reinserted: usize,
    /// Entries already equal to their snapshot.
    pub unchanged: usize,
    /// Entries whose target could not be determined.
    pub skipped: Vec<RestoreIssue>,
    /// Entries whose write failed.
    pub errors: Vec<RestoreIssue>,
    pub restored_at: DateTime<Utc>,
    /// History entry holding the pre-restore catalog, when checkpointing is on.
    pub checkpoint_id: Option<String>,
}

/// Restores catalog state from the history log.
#[derive(Debug, Clone, Default)]
pub struct RestoreEngine {
    history: HistoryLog,
    checkpoint: bool,
}

enum Target<'a> {
    Existing(&'a CatalogEntry),
    Missing,
    Skip(String),
}

impl RestoreEngine {
    /// `checkpoint` makes every restore first record the catalog it is
    /// about to overwrite as a history entry of its own.
    pub fn new(history: HistoryLog, checkpoint: bool) -> Self {
        Self {
            history,
            checkpoint,
        }
    }

    pub async fn restore<S>(&self, store: &S, history_id: &str) -> SyncResult<RestoreReport>
    where
        S: CatalogStore + HistoryStore + ?Sized,
    {
        let entry = store
            .get_history(history_id)
            .await
            .map_err(SyncError::Store)?
            .ok_or_else(|| SyncError::HistoryNotFound(history_id.to_string()))?;
        if let Some(at) = entry.restored_at {
            tracing::warn!(history_id, previous = %at, "history entry was already restored once");
        }

        let holder = format!("restore:{}", Uuid::new_v4());
        with_lease(store, &holder, || async {
            let current = store.list_entries().await.map_err(SyncError::Store)?;
            let mut report = RestoreReport {
                history_id: history_id.to_string(),
                restored: 0,
                reinserted: 0,
                unchanged: 0,
                skipped: Vec::new(),
                errors: Vec::new(),
                restored_at: Utc::now(),
                checkpoint_id: None,
            };

            for snap in &entry.snapshot_before {
                let result = match find_target(&current, snap) {
                    Target::Skip(reason) => {
                        report.skipped.push(issue(snap, reason));
                        continue;
                    }
                    Target::Existing(existing) if existing == snap => {
                        report.unchanged += 1;
                        continue;
                    }
                    Target::Existing(existing) => store
                        .update_entry(&existing.id, &EntryPatch::replace_with(snap))
                        .await
                        .map(|_| false),
                    Target::Missing => store.insert_entry(snap).await.map(|_| true),
                };
                match result {
                    Ok(true) => report.reinserted += 1,
                    Ok(false) => report.restored += 1,
                    Err(e) => {
                        tracing::warn!(id = %snap.id, error = %e, "restore write failed");
                        report.errors.push(issue(snap, format!("{:#}", e)));
                    }
                }
            }

            store
                .mark_restored(history_id, report.restored_at)
                .await
                .map_err(SyncError::Store)?;

            // Recorded after the stamp so pruning cannot remove the entry
            // being restored before it is marked.
            if self.checkpoint {
                let checkpoint = build_entry(
                    &format!("restore of {}", history_id),
                    &current,
                    &ReconciliationReport::default(),
                    false,
                    "",
                );
                match self.history.record(store, &checkpoint).await {
                    Ok(_) => report.checkpoint_id = Some(checkpoint.id.clone()),
                    Err(e) => tracing::warn!(error = %e, "failed to write restore checkpoint"),
                }
            }

            tracing::info!(
                history_id,
                restored = report.restored,
                reinserted = report.reinserted,
                unchanged = report.unchanged,
                skipped = report.skipped.len(),
                errors = report.errors.len(),
                "restore finished"
            );
            Ok(report)
        })
        .await
    }
}

fn find_target<'a>(current: &'a [CatalogEntry], snap: &CatalogEntry) -> Target<'a> {
    if snap.has_stable_id() {
        return match current.iter().find(|e| e.id == snap.id) {
            Some(e) => Target::Existing(e),
            None => Target::Missing,
        };
    }

    let key = composite_key(&[snap.model_ref.as_str(), snap.color.as_str()]);
    let candidates: Vec<&CatalogEntry> = current
        .iter()
        .filter(|e| composite_key(&[e.model_ref.as_str(), e.color.as_str()]) == key)
        .collect();
    match candidates.as_slice() {
        [] => Target::Missing,
        [only] => Target::Existing(only),
        many => match many.iter().find(|e| e.id == snap.id) {
            Some(e) => Target::Existing(e),
            None => Target::Skip(format!(
                "{} entries share modelRef+color and none has id {}",
                many.len(),
                snap.id
            )),
        },
    }
}

fn issue(snap: &CatalogEntry, message: String) -> RestoreIssue {
    RestoreIssue {
        id: snap.id.clone(),
        model_ref: snap.model_ref.clone(),
        color: snap.color.clone(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryEntry;
    use crate::store::memory::InMemoryStore;

    fn entry(id: &str, model: &str, color: &str, stock: i64) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            model_ref: model.to_string(),
            color: color.to_string(),
            size: None,
            stock_quantity: stock,
            price_retail: 10.0,
            price_wholesale: 5.0,
            product_name: None,
            brand: None,
            image_url: None,
        }
    }

    async fn seed_history(store: &InMemoryStore, snapshot: Vec<CatalogEntry>) -> HistoryEntry {
        let h = build_entry("feed.csv", &snapshot, &ReconciliationReport::default(), true, "");
        store.insert_history(&h).await.unwrap();
        h
    }

    #[tokio::test]
    async fn test_restore_overwrites_and_reinserts() {
        let store = InMemoryStore::with_entries(vec![entry("C1", "BG1", "RED", 0)]);
        let h = seed_history(
            &store,
            vec![entry("C1", "BG1", "RED", 4), entry("C2", "BG2", "RED", 3)],
        )
        .await;

        let report = RestoreEngine::default().restore(&store, &h.id).await.unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(report.reinserted, 1);
        assert!(report.errors.is_empty());
        assert_eq!(store.get("C1").unwrap().stock_quantity, 4);
        assert_eq!(store.get("C2").unwrap().stock_quantity, 3);
        assert!(store.get_history(&h.id).await.unwrap().unwrap().restored_at.is_some());
        assert!(store.lease_holder().is_none());
    }

    #[tokio::test]
    async fn test_synthetic_id_matched_by_model_color() {
        let store = InMemoryStore::with_entries(vec![entry("auto-new", "BG1", "RED", 0)]);
        let h = seed_history(&store, vec![entry("auto-old", "bg1", "red", 7)]).await;

        let report = RestoreEngine::default().restore(&store, &h.id).await.unwrap();
        assert_eq!(report.restored, 1);
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(store.get("auto-new").unwrap().stock_quantity, 7);
    }

    #[tokio::test]
    async fn test_ambiguous_synthetic_entry_skipped() {
        let store = InMemoryStore::with_entries(vec![
            entry("auto-a", "BG1", "RED", 0),
            entry("auto-b", "BG1", "RED", 0),
        ]);
        let h = seed_history(&store, vec![entry("auto-c", "BG1", "RED", 7)]).await;

        let report = RestoreEngine::default().restore(&store, &h.id).await.unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.restored, 0);
        assert!(store.snapshot().iter().all(|e| e.stock_quantity == 0));
    }

    #[tokio::test]
    async fn test_unknown_history_id() {
        let store = InMemoryStore::new();
        let err = RestoreEngine::default().restore(&store, "missing").await.unwrap_err();
        assert!(matches!(err, SyncError::HistoryNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_write_failure_recorded() {
        let store = InMemoryStore::with_entries(vec![
            entry("C1", "BG1", "RED", 0),
            entry("C2", "BG2", "RED", 0),
        ]);
        store.fail_writes_for("C1");
        let h = seed_history(
            &store,
            vec![entry("C1", "BG1", "RED", 4), entry("C2", "BG2", "RED", 3)],
        )
        .await;

        let report = RestoreEngine::default().restore(&store, &h.id).await.unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].id, "C1");
        assert_eq!(report.restored, 1);
    }

    #[tokio::test]
    async fn test_checkpoint_captures_pre_restore_state() {
        let store = InMemoryStore::with_entries(vec![entry("C1", "BG1", "RED", 0)]);
        let h = seed_history(&store, vec![entry("C1", "BG1", "RED", 4)]).await;

        let engine = RestoreEngine::new(HistoryLog::default(), true);
        let report = engine.restore(&store, &h.id).await.unwrap();
        let checkpoint_id = report.checkpoint_id.unwrap();
        let checkpoint = store.get_history(&checkpoint_id).await.unwrap().unwrap();
        assert_eq!(checkpoint.snapshot_before[0].stock_quantity, 0);

        // The checkpoint itself restores the pre-restore catalog.
        engine.restore(&store, &checkpoint_id).await.unwrap();
        assert_eq!(store.get("C1").unwrap().stock_quantity, 0);
    }
}
