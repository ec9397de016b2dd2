//! Human-readable rendering of run, restore and history output.
//!
//! Detail lists are truncated to [`DISPLAY_LIMIT`] lines each with a
//! "... and N more" footer; `--json` output is never truncated.

use std::fmt::Write;

use catalog_sync_core::models::{HistoryEntry, ReconciliationReport};
use catalog_sync_core::RestoreReport;

/// Maximum lines printed per detail list.
pub const DISPLAY_LIMIT: usize = 20;

/// Render a reconciliation report.
pub fn render_report(
    report: &ReconciliationReport,
    file_name: &str,
    dry_run: bool,
    history_id: Option<&str>,
) -> String {
    let mut out = String::new();
    let s = &report.stats;

    let _ = writeln!(
        out,
        "reconcile {}{}",
        file_name,
        if dry_run { " (dry-run)" } else { "" }
    );
    let _ = writeln!(out, "  rows: {}", s.total_rows);
    let _ = writeln!(out, "  updated: {}", s.updated);
    let _ = writeln!(out, "  inserted: {}", s.inserted);
    let _ = writeln!(out, "  unchanged: {}", s.unchanged);
    let _ = writeln!(out, "  not found: {}", s.not_found);
    let _ = writeln!(out, "  stock zeroed: {}", s.stock_zeroed);
    let _ = writeln!(out, "  duplicates in file: {}", report.duplicates_in_file.len());
    let _ = writeln!(out, "  errors: {}", s.errors_count);

    section(&mut out, "Changes", &report.changes, |c| {
        format!(
            "{} / {}  {}: {} -> {}",
            c.model_ref, c.color, c.field, c.old_value, c.new_value
        )
    });
    section(&mut out, "Inserted", &report.created, |c| {
        format!(
            "row {}  {} / {}{}  stock {}  ({})",
            c.row,
            c.model_ref,
            c.color,
            c.size.as_deref().map(|s| format!(" / {}", s)).unwrap_or_default(),
            c.stock_quantity,
            c.id
        )
    });
    section(&mut out, "Not found", &report.not_found, |n| {
        let suggestions = n
            .suggestions
            .iter()
            .map(|s| format!("{} ({} / {})", s.id, s.model_ref, s.color))
            .collect::<Vec<_>>()
            .join(", ");
        if suggestions.is_empty() {
            format!("row {}  {}", n.row, n.reason)
        } else {
            format!("row {}  {}  candidates: {}", n.row, n.reason, suggestions)
        }
    });
    section(&mut out, "Duplicates in file", &report.duplicates_in_file, |d| {
        format!("row {}  same target as row {}  [{}]", d.row, d.first_row, d.key)
    });
    section(&mut out, "Zeroed", &report.zeroed, |z| {
        format!("{} / {}  {} -> 0  ({})", z.model_ref, z.color, z.old_stock, z.id)
    });
    section(&mut out, "Errors", &report.errors, |e| {
        if e.row == 0 {
            e.message.clone()
        } else {
            format!("row {}  {}", e.row, e.message)
        }
    });

    let _ = writeln!(out);
    match (dry_run, history_id) {
        (true, _) => {
            let _ = writeln!(out, "dry-run: no changes written");
        }
        (false, Some(id)) => {
            let _ = writeln!(out, "history: {}", id);
            let _ = writeln!(out, "ok");
        }
        (false, None) => {
            let _ = writeln!(out, "history: not recorded (see log)");
            let _ = writeln!(out, "ok");
        }
    }
    out
}

/// Render a restore outcome.
pub fn render_restore(report: &RestoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "restore {}", report.history_id);
    let _ = writeln!(out, "  restored: {}", report.restored);
    let _ = writeln!(out, "  reinserted: {}", report.reinserted);
    let _ = writeln!(out, "  unchanged: {}", report.unchanged);
    let _ = writeln!(out, "  skipped: {}", report.skipped.len());
    let _ = writeln!(out, "  errors: {}", report.errors.len());
    section(&mut out, "Skipped", &report.skipped, |i| {
        format!("{} / {}  ({})  {}", i.model_ref, i.color, i.id, i.message)
    });
    section(&mut out, "Errors", &report.errors, |i| {
        format!("{} / {}  ({})  {}", i.model_ref, i.color, i.id, i.message)
    });
    if let Some(id) = &report.checkpoint_id {
        let _ = writeln!(out, "\ncheckpoint: {}", id);
    }
    let _ = writeln!(out, "\nrestored at {}", report.restored_at.format("%Y-%m-%d %H:%M:%S UTC"));
    out
}

/// One line per retained history entry, newest first.
pub fn render_history_list(entries: &[HistoryEntry]) -> String {
    let mut out = String::new();
    if entries.is_empty() {
        let _ = writeln!(out, "No history entries.");
        return out;
    }
    let _ = writeln!(
        out,
        "{:<36}  {:<19}  {:>4} {:>4} {:>4} {:>4}  {:<8}  {}",
        "ID", "UPLOADED", "UPD", "INS", "ZERO", "ERR", "RESTORED", "FILE"
    );
    for h in entries {
        let _ = writeln!(
            out,
            "{:<36}  {:<19}  {:>4} {:>4} {:>4} {:>4}  {:<8}  {}",
            h.id,
            h.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
            h.stats.updated,
            h.stats.inserted,
            h.stats.stock_zeroed,
            h.stats.errors_count,
            if h.restored_at.is_some() { "yes" } else { "no" },
            h.file_name
        );
    }
    out
}

/// Full detail of one history entry (capped lists as stored).
pub fn render_history_entry(h: &HistoryEntry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "history {}", h.id);
    let _ = writeln!(out, "  file: {}", h.file_name);
    let _ = writeln!(out, "  uploaded: {}", h.uploaded_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "  stock sync: {}", if h.sync_stock_enabled { "on" } else { "off" });
    if !h.feed_digest.is_empty() {
        let _ = writeln!(out, "  feed sha256: {}", h.feed_digest);
    }
    match h.restored_at {
        Some(at) => {
            let _ = writeln!(out, "  restored: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        None => {
            let _ = writeln!(out, "  restored: never");
        }
    }
    let _ = writeln!(
        out,
        "  stats: {} rows, {} updated, {} inserted, {} unchanged, {} not found, {} zeroed, {} errors",
        h.stats.total_rows,
        h.stats.updated,
        h.stats.inserted,
        h.stats.unchanged,
        h.stats.not_found,
        h.stats.stock_zeroed,
        h.stats.errors_count
    );
    let _ = writeln!(out, "  snapshot: {} entries", h.snapshot_before.len());

    section(&mut out, "Changes", &h.changes, |c| {
        format!(
            "{} / {}  {}: {} -> {}",
            c.model_ref, c.color, c.field, c.old_value, c.new_value
        )
    });
    section(&mut out, "Inserted", &h.inserted_products, |c| {
        format!("{} / {}  stock {}  ({})", c.model_ref, c.color, c.stock_quantity, c.id)
    });
    section(&mut out, "Zeroed", &h.zeroed_products, |z| {
        format!("{} / {}  {} -> 0  ({})", z.model_ref, z.color, z.old_stock, z.id)
    });
    out
}

fn section<T>(out: &mut String, title: &str, items: &[T], line: impl Fn(&T) -> String) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{} ({}):", title, items.len());
    for item in items.iter().take(DISPLAY_LIMIT) {
        let _ = writeln!(out, "  {}", line(item));
    }
    if items.len() > DISPLAY_LIMIT {
        let _ = writeln!(out, "  ... and {} more", items.len() - DISPLAY_LIMIT);
    }
}
