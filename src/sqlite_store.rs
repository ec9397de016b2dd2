//! SQLite-backed [`CatalogStore`] and [`HistoryStore`].
//!
//! Catalog entries map one-to-one onto `catalog_entries` rows. History
//! entries keep their scalar fields in columns and their detail lists and
//! snapshot as JSON text. The run lease is a single row in
//! `catalog_lease`; a lease older than the configured TTL is treated as
//! abandoned and can be taken over.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use catalog_sync_core::models::{CatalogEntry, EntryPatch, HistoryEntry};
use catalog_sync_core::store::{CatalogStore, HistoryStore};

use crate::config::Config;
use crate::db;

const LEASE_NAME: &str = "catalog";

/// SQLite implementation of both store traits.
pub struct SqliteStore {
    pool: SqlitePool,
    lease_ttl_secs: i64,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, lease_ttl_secs: u64) -> Self {
        Self {
            pool,
            lease_ttl_secs: i64::try_from(lease_ttl_secs).unwrap_or(i64::MAX),
        }
    }

    /// Connect to the configured database. The schema must already exist
    /// (`csync init`).
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        Ok(Self::new(pool, config.lease.ttl_secs))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn entry_from_row(row: &SqliteRow) -> CatalogEntry {
    CatalogEntry {
        id: row.get("id"),
        model_ref: row.get("model_ref"),
        color: row.get("color"),
        size: row.get("size"),
        stock_quantity: row.get("stock_quantity"),
        price_retail: row.get("price_retail"),
        price_wholesale: row.get("price_wholesale"),
        product_name: row.get("product_name"),
        brand: row.get("brand"),
        image_url: row.get("image_url"),
    }
}

fn micros_to_utc(us: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us).with_context(|| format!("timestamp out of range: {}", us))
}

fn history_from_row(row: &SqliteRow) -> Result<HistoryEntry> {
    let id: String = row.get("id");
    let json = |column: &str| -> String { row.get(column) };
    let restored_at: Option<i64> = row.get("restored_at");

    Ok(HistoryEntry {
        file_name: row.get("file_name"),
        uploaded_at: micros_to_utc(row.get("uploaded_at"))?,
        stats: serde_json::from_str(&json("stats_json"))
            .with_context(|| format!("corrupt stats in history entry {}", id))?,
        changes: serde_json::from_str(&json("changes_json"))
            .with_context(|| format!("corrupt changes in history entry {}", id))?,
        inserted_products: serde_json::from_str(&json("inserted_json"))
            .with_context(|| format!("corrupt inserted list in history entry {}", id))?,
        zeroed_products: serde_json::from_str(&json("zeroed_json"))
            .with_context(|| format!("corrupt zeroed list in history entry {}", id))?,
        snapshot_before: serde_json::from_str(&json("snapshot_json"))
            .with_context(|| format!("corrupt snapshot in history entry {}", id))?,
        sync_stock_enabled: row.get("sync_stock_enabled"),
        feed_digest: row.get("feed_digest"),
        restored_at: restored_at.map(micros_to_utc).transpose()?,
        id,
    })
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn list_entries(&self) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query("SELECT * FROM catalog_entries ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(entry_from_row).collect())
    }

    async fn insert_entry(&self, entry: &CatalogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_entries (id, model_ref, color, size, stock_quantity,
                                         price_retail, price_wholesale, product_name,
                                         brand, image_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.model_ref)
        .bind(&entry.color)
        .bind(&entry.size)
        .bind(entry.stock_quantity)
        .bind(entry.price_retail)
        .bind(entry.price_wholesale)
        .bind(&entry.product_name)
        .bind(&entry.brand)
        .bind(&entry.image_url)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert of entry {} failed", entry.id))?;
        Ok(())
    }

    async fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM catalog_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            bail!("entry {} not found", id);
        };
        let mut entry = entry_from_row(&row);
        patch.apply_to(&mut entry);

        sqlx::query(
            r#"
            UPDATE catalog_entries SET
                model_ref = ?, color = ?, size = ?, stock_quantity = ?,
                price_retail = ?, price_wholesale = ?, product_name = ?,
                brand = ?, image_url = ?
            WHERE id = ?
            "#,
        )
        .bind(&entry.model_ref)
        .bind(&entry.color)
        .bind(&entry.size)
        .bind(entry.stock_quantity)
        .bind(entry.price_retail)
        .bind(entry.price_wholesale)
        .bind(&entry.product_name)
        .bind(&entry.brand)
        .bind(&entry.image_url)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn acquire_lease(&self, holder: &str) -> Result<Option<String>> {
        let now = Utc::now().timestamp();
        let stale_before = now.saturating_sub(self.lease_ttl_secs);

        // Take the row if it is free, ours, or abandoned; otherwise leave it.
        sqlx::query(
            r#"
            INSERT INTO catalog_lease (name, holder, acquired_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                holder = excluded.holder,
                acquired_at = excluded.acquired_at
            WHERE catalog_lease.holder = excluded.holder
               OR catalog_lease.acquired_at < ?
            "#,
        )
        .bind(LEASE_NAME)
        .bind(holder)
        .bind(now)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        let current: String = sqlx::query_scalar("SELECT holder FROM catalog_lease WHERE name = ?")
            .bind(LEASE_NAME)
            .fetch_one(&self.pool)
            .await?;

        if current == holder {
            Ok(None)
        } else {
            Ok(Some(current))
        }
    }

    async fn release_lease(&self, holder: &str) -> Result<()> {
        sqlx::query("DELETE FROM catalog_lease WHERE name = ? AND holder = ?")
            .bind(LEASE_NAME)
            .bind(holder)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn insert_history(&self, entry: &HistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO history_entries (id, file_name, uploaded_at, stats_json, changes_json,
                                         inserted_json, zeroed_json, snapshot_json,
                                         sync_stock_enabled, feed_digest, restored_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.file_name)
        .bind(entry.uploaded_at.timestamp_micros())
        .bind(serde_json::to_string(&entry.stats)?)
        .bind(serde_json::to_string(&entry.changes)?)
        .bind(serde_json::to_string(&entry.inserted_products)?)
        .bind(serde_json::to_string(&entry.zeroed_products)?)
        .bind(serde_json::to_string(&entry.snapshot_before)?)
        .bind(entry.sync_stock_enabled)
        .bind(&entry.feed_digest)
        .bind(entry.restored_at.map(|t| t.timestamp_micros()))
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert of history entry {} failed", entry.id))?;
        Ok(())
    }

    async fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query("SELECT * FROM history_entries ORDER BY uploaded_at DESC, rowid DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(history_from_row).collect()
    }

    async fn get_history(&self, id: &str) -> Result<Option<HistoryEntry>> {
        let row = sqlx::query("SELECT * FROM history_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(history_from_row).transpose()
    }

    async fn delete_history(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM history_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_restored(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE history_entries SET restored_at = ? WHERE id = ?")
            .bind(at.timestamp_micros())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            bail!("history entry {} not found", id);
        }
        Ok(())
    }
}
