//! Catalog statistics overview.
//!
//! Used by `csync stats` to show what the catalog holds and how much history
//! is retained for restore.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use catalog_sync_core::models::SYNTHETIC_ID_PREFIX;

use crate::config::Config;
use crate::db;

/// Aggregate counts over the catalog and history tables.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CatalogStats {
    pub entries: i64,
    pub in_stock: i64,
    pub zero_stock: i64,
    pub total_units: i64,
    pub synthetic_ids: i64,
    pub history_entries: i64,
    pub last_run_at: Option<i64>,
}

pub async fn collect_stats(config: &Config) -> Result<CatalogStats> {
    let pool = db::connect(config).await?;

    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_entries")
        .fetch_one(&pool)
        .await?;

    let in_stock: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM catalog_entries WHERE stock_quantity > 0")
            .fetch_one(&pool)
            .await?;

    let total_units: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(stock_quantity), 0) FROM catalog_entries")
            .fetch_one(&pool)
            .await?;

    let synthetic_ids: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM catalog_entries WHERE id LIKE ? || '%'")
            .bind(SYNTHETIC_ID_PREFIX)
            .fetch_one(&pool)
            .await?;

    let history_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM history_entries")
        .fetch_one(&pool)
        .await?;

    let last_run_at: Option<i64> = sqlx::query_scalar("SELECT MAX(uploaded_at) FROM history_entries")
        .fetch_one(&pool)
        .await?;

    pool.close().await;

    Ok(CatalogStats {
        entries,
        in_stock,
        zero_stock: entries - in_stock,
        total_units,
        synthetic_ids,
        history_entries,
        last_run_at,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let stats = collect_stats(config).await?;

    println!("Catalog Sync — Catalog Stats");
    println!("============================");
    println!();
    println!("  Database:       {}", config.db.path.display());
    println!();
    println!("  Entries:        {}", stats.entries);
    println!("  In stock:       {}", stats.in_stock);
    println!("  Zero stock:     {}", stats.zero_stock);
    println!("  Total units:    {}", stats.total_units);
    println!("  Synthetic ids:  {}", stats.synthetic_ids);
    println!();
    println!(
        "  History:        {} / {} retained",
        stats.history_entries, config.history.retain
    );
    let last_run = stats
        .last_run_at
        .and_then(DateTime::from_timestamp_micros)
        .map(|at| describe_run_age(at, Utc::now()))
        .unwrap_or_else(|| "never".to_string());
    println!("  Last run:       {}", last_run);
    println!();
    Ok(())
}

/// How long ago a run happened, coarse enough to judge whether the catalog
/// is overdue for a feed. Older than a week falls back to the date.
fn describe_run_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(at);
    let plural = |n: i64, unit: &str| format!("{} {}{} ago", n, unit, if n == 1 { "" } else { "s" });

    if age < Duration::zero() || age >= Duration::days(7) {
        at.format("%Y-%m-%d %H:%M UTC").to_string()
    } else if age < Duration::minutes(1) {
        "just now".to_string()
    } else if age < Duration::hours(1) {
        plural(age.num_minutes(), "minute")
    } else if age < Duration::days(1) {
        plural(age.num_hours(), "hour")
    } else {
        plural(age.num_days(), "day")
    }
}
