use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Catalog entries; (model_ref, color, size) is deliberately not unique.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_entries (
            id TEXT PRIMARY KEY,
            model_ref TEXT NOT NULL,
            color TEXT NOT NULL,
            size TEXT,
            stock_quantity INTEGER NOT NULL DEFAULT 0,
            price_retail REAL NOT NULL DEFAULT 0,
            price_wholesale REAL NOT NULL DEFAULT 0,
            product_name TEXT,
            brand TEXT,
            image_url TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // History entries; timestamps are Unix microseconds, detail lists and
    // the snapshot are JSON
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS history_entries (
            id TEXT PRIMARY KEY,
            file_name TEXT NOT NULL,
            uploaded_at INTEGER NOT NULL,
            stats_json TEXT NOT NULL,
            changes_json TEXT NOT NULL,
            inserted_json TEXT NOT NULL,
            zeroed_json TEXT NOT NULL,
            snapshot_json TEXT NOT NULL,
            sync_stock_enabled INTEGER NOT NULL,
            feed_digest TEXT NOT NULL DEFAULT '',
            restored_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Single-row run lease
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_lease (
            name TEXT PRIMARY KEY,
            holder TEXT NOT NULL,
            acquired_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_catalog_model_color ON catalog_entries(model_ref, color)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_history_uploaded_at ON history_entries(uploaded_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
