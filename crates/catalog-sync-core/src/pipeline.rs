//! Reconciliation pipeline orchestration.
//!
//! Coordinates the full run: normalize → resolve → diff → stage across all
//! rows, then the optional stock-sync pass, then apply and history. Planning
//! is a pure function of the feed and a catalog snapshot; only the apply
//! phase touches the store, and a dry-run skips it entirely.
//!
//! ```text
//! rows ─▶ RowNormalizer ─▶ KeyResolver ─▶ DiffEngine ─▶ staged changes
//!                                                          │
//!                         stock sync (unseen entries) ◀────┤
//!                                                          ▼
//!                                      apply (lease held) ─▶ HistoryLog
//! ```

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::diff::{diff_entry, EntryDiff};
use crate::error::{SyncError, SyncResult};
use crate::history::{build_entry, HistoryLog};
use crate::index::{composite_key, norm_key, CatalogIndex};
use crate::models::{
    CatalogEntry, CreatedProduct, DuplicateRow, EntryPatch, FeedRow, IncomingRecord, NotFoundRow,
    ReconciliationReport, RowError, Suggestion, UpdatedProduct, SYNTHETIC_ID_PREFIX,
};
use crate::normalize::{RowNormalizer, MISSING_REQUIRED};
use crate::resolve::KeyResolver;
use crate::stock_sync::{entries_to_zero, zero_change, zeroed_product};
use crate::store::{with_lease, CatalogStore, HistoryStore};

/// Namespace for synthetic entry ids (UUID v5 over `modelRef|color|size`).
const SYNTHETIC_NAMESPACE: Uuid = Uuid::from_u128(0x6b1d_9c2e_4f0a_4d7b_9e51_c0a8_3f27_d4e6);

/// Values given to fields a feed row cannot supply on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDefaults {
    pub brand: String,
    pub placeholder_image: String,
}

impl Default for CatalogDefaults {
    fn default() -> Self {
        Self {
            brand: "Generic".to_string(),
            placeholder_image: "/images/placeholder.png".to_string(),
        }
    }
}

/// Per-run switches supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Name of the feed, recorded in history.
    pub file_name: String,
    /// Zero the stock of entries the feed did not reference.
    pub sync_stock: bool,
    /// Plan and report only: no catalog writes, no history entry.
    pub dry_run: bool,
}

/// One mutation waiting for the apply phase.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedChange {
    Insert {
        row: usize,
        entry: CatalogEntry,
    },
    Update {
        row: usize,
        before: CatalogEntry,
        diff: EntryDiff,
    },
    ZeroStock {
        before: CatalogEntry,
    },
}

/// Result of the planning phase.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    pub total_rows: usize,
    pub staged: Vec<StagedChange>,
    pub unchanged: usize,
    pub not_found: Vec<NotFoundRow>,
    pub errors: Vec<RowError>,
    pub duplicates_in_file: Vec<DuplicateRow>,
    /// Ids of catalog entries the feed referenced or created.
    pub seen: HashSet<String>,
    pub feed_digest: String,
}

/// What a run hands back to its caller.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: ReconciliationReport,
    /// Set when a history entry was written.
    pub history_id: Option<String>,
    pub feed_digest: String,
}

/// The reconciliation engine.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    normalizer: RowNormalizer,
    defaults: CatalogDefaults,
    history: HistoryLog,
}

impl Reconciler {
    pub fn new(normalizer: RowNormalizer, defaults: CatalogDefaults, history: HistoryLog) -> Self {
        Self {
            normalizer,
            defaults,
            history,
        }
    }

    /// Plan a run against `catalog` without touching any store.
    pub fn plan(&self, catalog: &[CatalogEntry], rows: &[FeedRow], sync_stock: bool) -> ReconcilePlan {
        let index = CatalogIndex::build(catalog);
        let resolver = KeyResolver::new(&index);
        let mut plan = ReconcilePlan {
            total_rows: rows.len(),
            ..Default::default()
        };
        let mut hasher = Sha256::new();
        // target key -> first row that claimed it
        let mut claimed: HashMap<String, usize> = HashMap::new();

        for row in rows {
            hasher.update(serde_json::to_vec(&row.cells).unwrap_or_default());
            hasher.update(b"\n");

            let record = match self.normalizer.normalize(row) {
                Ok(record) => record,
                Err(e) => {
                    plan.errors.push(e);
                    continue;
                }
            };

            let matched = resolver.resolve(&record);
            if matched.is_ambiguous() {
                // Referenced by the feed, so never zeroed by stock sync.
                for candidate in &matched.ambiguous_candidates {
                    plan.seen.insert(candidate.id.clone());
                }
                plan.not_found.push(NotFoundRow {
                    row: record.row_number,
                    raw: row.raw_text(),
                    reason: format!(
                        "ambiguous match on {}: {} candidates",
                        matched.tier.describe(),
                        matched.ambiguous_candidates.len()
                    ),
                    suggestions: matched
                        .ambiguous_candidates
                        .iter()
                        .map(|e| Suggestion::from(*e))
                        .collect(),
                });
                continue;
            }

            match matched.entry {
                Some(entry) => {
                    let keys = [format!("id:{}", norm_key(&entry.id))];
                    if let Some(dup) = claim(&mut claimed, &keys, record.row_number) {
                        plan.duplicates_in_file.push(dup);
                        continue;
                    }
                    plan.seen.insert(entry.id.clone());

                    let diff = diff_entry(&record, entry);
                    if diff.is_unchanged() {
                        plan.unchanged += 1;
                    } else {
                        plan.staged.push(StagedChange::Update {
                            row: record.row_number,
                            before: entry.clone(),
                            diff,
                        });
                    }
                }
                None => {
                    let Some(entry) = self.new_entry(&record) else {
                        plan.errors.push(RowError {
                            row: record.row_number,
                            message: MISSING_REQUIRED.to_string(),
                        });
                        continue;
                    };
                    let keys = [
                        format!("id:{}", norm_key(&entry.id)),
                        format!(
                            "mcs:{}",
                            composite_key(&[
                                entry.model_ref.as_str(),
                                entry.color.as_str(),
                                entry.size.as_deref().unwrap_or(""),
                            ])
                        ),
                    ];
                    if let Some(dup) = claim(&mut claimed, &keys, record.row_number) {
                        plan.duplicates_in_file.push(dup);
                        continue;
                    }
                    plan.seen.insert(entry.id.clone());
                    plan.staged.push(StagedChange::Insert {
                        row: record.row_number,
                        entry,
                    });
                }
            }
        }

        if sync_stock {
            for entry in entries_to_zero(catalog, &plan.seen) {
                plan.staged.push(StagedChange::ZeroStock {
                    before: entry.clone(),
                });
            }
        }

        plan.feed_digest = format!("{:x}", hasher.finalize());
        plan
    }

    /// Build the entry a new row would create. `None` if the row has no color.
    fn new_entry(&self, record: &IncomingRecord) -> Option<CatalogEntry> {
        let color = record.color.clone()?;
        let id = match &record.id {
            Some(id) => id.clone(),
            None => synthetic_id(&record.model_ref, &color, record.size.as_deref()),
        };
        Some(CatalogEntry {
            id,
            model_ref: record.model_ref.clone(),
            color,
            size: record.size.clone(),
            stock_quantity: record.stock_quantity.unwrap_or(0),
            price_retail: record.price_retail.unwrap_or(0.0),
            price_wholesale: record.price_wholesale.unwrap_or(0.0),
            product_name: record.product_name.clone(),
            brand: Some(self.defaults.brand.clone()),
            image_url: Some(self.defaults.placeholder_image.clone()),
        })
    }

    /// Turn a plan into a report, writing each staged change to `store`
    /// when `write` is set. A failed write is recorded as a row error and
    /// the remaining changes still run.
    pub async fn apply<S: CatalogStore + ?Sized>(
        &self,
        plan: &ReconcilePlan,
        store: &S,
        write: bool,
    ) -> ReconciliationReport {
        let mut report = ReconciliationReport {
            not_found: plan.not_found.clone(),
            errors: plan.errors.clone(),
            duplicates_in_file: plan.duplicates_in_file.clone(),
            ..Default::default()
        };
        report.stats.total_rows = plan.total_rows;
        report.stats.unchanged = plan.unchanged;

        for change in &plan.staged {
            match change {
                StagedChange::Insert { row, entry } => {
                    let result = if write {
                        store.insert_entry(entry).await
                    } else {
                        Ok(())
                    };
                    match result {
                        Ok(()) => report.created.push(CreatedProduct {
                            row: *row,
                            id: entry.id.clone(),
                            model_ref: entry.model_ref.clone(),
                            color: entry.color.clone(),
                            size: entry.size.clone(),
                            stock_quantity: entry.stock_quantity,
                        }),
                        Err(e) => {
                            tracing::warn!(row, id = %entry.id, error = %e, "insert failed");
                            report.errors.push(RowError {
                                row: *row,
                                message: format!("insert of {} failed: {:#}", entry.label(), e),
                            });
                        }
                    }
                }
                StagedChange::Update { row, before, diff } => {
                    let result = if write {
                        store.update_entry(&before.id, &diff.patch).await
                    } else {
                        Ok(())
                    };
                    match result {
                        Ok(()) => {
                            report.changes.extend(diff.changes.iter().cloned());
                            report.updated.push(UpdatedProduct {
                                row: *row,
                                id: before.id.clone(),
                                model_ref: before.model_ref.clone(),
                                color: before.color.clone(),
                                changes: diff.changes.clone(),
                            });
                        }
                        Err(e) => {
                            tracing::warn!(row, id = %before.id, error = %e, "update failed");
                            report.errors.push(RowError {
                                row: *row,
                                message: format!("update of {} failed: {:#}", before.label(), e),
                            });
                        }
                    }
                }
                StagedChange::ZeroStock { before } => {
                    let result = if write {
                        let patch = EntryPatch {
                            stock_quantity: Some(0),
                            ..Default::default()
                        };
                        store.update_entry(&before.id, &patch).await
                    } else {
                        Ok(())
                    };
                    match result {
                        Ok(()) => {
                            report.changes.push(zero_change(before));
                            report.zeroed.push(zeroed_product(before));
                        }
                        Err(e) => {
                            tracing::warn!(id = %before.id, error = %e, "stock zeroing failed");
                            report.errors.push(RowError {
                                row: 0,
                                message: format!(
                                    "stock sync of {} ({}) failed: {:#}",
                                    before.label(),
                                    before.id,
                                    e
                                ),
                            });
                        }
                    }
                }
            }
        }

        report.stats.updated = report.updated.len();
        report.stats.inserted = report.created.len();
        report.stats.stock_zeroed = report.zeroed.len();
        report.stats.not_found = report.not_found.len();
        report.stats.errors_count = report.errors.len();
        report
    }

    /// Run the whole pipeline against `store`.
    ///
    /// Non-dry runs hold the catalog lease from the snapshot read through the
    /// history write. A history write failure is logged and leaves
    /// `history_id` unset; it does not fail the run.
    pub async fn run<S>(&self, store: &S, rows: &[FeedRow], options: &RunOptions) -> SyncResult<RunOutcome>
    where
        S: CatalogStore + HistoryStore + ?Sized,
    {
        if rows.is_empty() {
            return Err(SyncError::EmptyFeed);
        }
        tracing::info!(
            file = %options.file_name,
            rows = rows.len(),
            dry_run = options.dry_run,
            sync_stock = options.sync_stock,
            "reconciliation started"
        );

        if options.dry_run {
            let catalog = store.list_entries().await.map_err(SyncError::Store)?;
            let plan = self.plan(&catalog, rows, options.sync_stock);
            let report = self.apply(&plan, store, false).await;
            log_finished(&report, true);
            return Ok(RunOutcome {
                report,
                history_id: None,
                feed_digest: plan.feed_digest,
            });
        }

        let holder = format!("reconcile:{}", Uuid::new_v4());
        with_lease(store, &holder, || async {
            let catalog = store.list_entries().await.map_err(SyncError::Store)?;
            let plan = self.plan(&catalog, rows, options.sync_stock);
            let report = self.apply(&plan, store, true).await;

            let entry = build_entry(
                &options.file_name,
                &catalog,
                &report,
                options.sync_stock,
                &plan.feed_digest,
            );
            let history_id = match self.history.record(store, &entry).await {
                Ok(_) => Some(entry.id.clone()),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to write history entry");
                    None
                }
            };

            log_finished(&report, false);
            Ok(RunOutcome {
                report,
                history_id,
                feed_digest: plan.feed_digest,
            })
        })
        .await
    }
}

/// Record the first claimant of each key; report a duplicate if any key was
/// already claimed by an earlier row.
fn claim(claimed: &mut HashMap<String, usize>, keys: &[String], row: usize) -> Option<DuplicateRow> {
    if let Some((key, first)) = keys
        .iter()
        .find_map(|k| claimed.get(k).map(|first| (k.clone(), *first)))
    {
        return Some(DuplicateRow {
            row,
            first_row: first,
            key,
        });
    }
    for key in keys {
        claimed.insert(key.clone(), row);
    }
    None
}

/// Deterministic id for an entry created from a row without one.
pub fn synthetic_id(model_ref: &str, color: &str, size: Option<&str>) -> String {
    let key = composite_key(&[model_ref, color, size.unwrap_or("")]);
    format!(
        "{}{}",
        SYNTHETIC_ID_PREFIX,
        Uuid::new_v5(&SYNTHETIC_NAMESPACE, key.as_bytes())
    )
}

fn log_finished(report: &ReconciliationReport, dry_run: bool) {
    let s = &report.stats;
    tracing::info!(
        dry_run,
        updated = s.updated,
        inserted = s.inserted,
        unchanged = s.unchanged,
        not_found = s.not_found,
        stock_zeroed = s.stock_zeroed,
        errors = s.errors_count,
        "reconciliation finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;

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

    fn row(n: usize, model: &str, color: &str) -> FeedRow {
        FeedRow::new(n).cell("modelRef", model).cell("color", color)
    }

    #[test]
    fn test_plan_classifies_rows() {
        let catalog = vec![entry("A1", "BG100", "BLACK", 5), entry("A2", "BG200", "RED", 2)];
        let rows = vec![
            row(2, "BG100", "BLACK").cell("stock", 8i64),
            row(3, "BG200", "RED").cell("stock", 2i64),
            row(4, "BG300", "BLUE").cell("stock", 1i64),
            FeedRow::new(5).cell("color", "RED"),
        ];
        let plan = Reconciler::default().plan(&catalog, &rows, false);
        assert_eq!(plan.total_rows, 4);
        assert_eq!(plan.unchanged, 1);
        assert_eq!(plan.errors.len(), 1);
        assert_eq!(plan.errors[0].row, 5);
        assert_eq!(plan.staged.len(), 2);
        assert!(matches!(plan.staged[0], StagedChange::Update { row: 2, .. }));
        assert!(matches!(plan.staged[1], StagedChange::Insert { row: 4, .. }));
        assert!(plan.seen.contains("A1") && plan.seen.contains("A2"));
    }

    #[test]
    fn test_new_row_without_color_is_error() {
        let plan = Reconciler::default().plan(&[], &[FeedRow::new(2).cell("modelRef", "BG1")], false);
        assert!(plan.staged.is_empty());
        assert_eq!(plan.errors[0].message, MISSING_REQUIRED);
    }

    #[test]
    fn test_insert_uses_defaults() {
        let rec_row = row(2, "BG100", "RED");
        let plan = Reconciler::default().plan(&[], &[rec_row], false);
        match &plan.staged[0] {
            StagedChange::Insert { entry, .. } => {
                assert_eq!(entry.stock_quantity, 0);
                assert_eq!(entry.brand.as_deref(), Some("Generic"));
                assert_eq!(entry.image_url.as_deref(), Some("/images/placeholder.png"));
                assert!(entry.id.starts_with(SYNTHETIC_ID_PREFIX));
                assert!(!entry.has_stable_id());
            }
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[test]
    fn test_synthetic_id_is_deterministic() {
        assert_eq!(
            synthetic_id("BG100", "RED", None),
            synthetic_id(" bg100", "red ", None)
        );
        assert_ne!(
            synthetic_id("BG100", "RED", None),
            synthetic_id("BG100", "RED", Some("M"))
        );
    }

    #[test]
    fn test_duplicate_rows_first_wins() {
        let catalog = vec![entry("A1", "BG100", "BLACK", 5)];
        let rows = vec![
            row(2, "BG100", "BLACK").cell("stock", 8i64),
            row(3, "bg100", "black").cell("stock", 9i64),
            row(4, "BG500", "RED"),
            row(5, "BG500", "RED"),
        ];
        let plan = Reconciler::default().plan(&catalog, &rows, false);
        assert_eq!(plan.duplicates_in_file.len(), 2);
        assert_eq!(plan.duplicates_in_file[0].row, 3);
        assert_eq!(plan.duplicates_in_file[0].first_row, 2);
        assert_eq!(plan.duplicates_in_file[1].row, 5);
        assert_eq!(plan.duplicates_in_file[1].first_row, 4);
        match &plan.staged[0] {
            StagedChange::Update { diff, .. } => {
                assert_eq!(diff.changes[0].new_value, FieldValue::Int(8))
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_candidates_are_protected_from_stock_sync() {
        let catalog = vec![
            entry("A1", "BG999", "BLACK", 4),
            entry("A2", "BG999", "WHITE", 4),
            entry("A3", "BG100", "RED", 4),
        ];
        let rows = vec![FeedRow::new(2).cell("modelRef", "BG999")];
        let plan = Reconciler::default().plan(&catalog, &rows, true);
        assert_eq!(plan.not_found.len(), 1);
        let zeroed: Vec<&str> = plan
            .staged
            .iter()
            .filter_map(|c| match c {
                StagedChange::ZeroStock { before } => Some(before.id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(zeroed, vec!["A3"]);
    }

    #[test]
    fn test_feed_digest_depends_on_content() {
        let r = Reconciler::default();
        let a = r.plan(&[], &[row(2, "BG1", "RED")], false).feed_digest;
        let b = r.plan(&[], &[row(2, "BG1", "RED")], false).feed_digest;
        let c = r.plan(&[], &[row(2, "BG1", "BLUE")], false).feed_digest;
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
