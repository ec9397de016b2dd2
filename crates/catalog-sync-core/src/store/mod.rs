//! Storage abstraction for Catalog Sync.
//!
//! The [`CatalogStore`] trait covers the catalog reads and writes the
//! reconciliation pipeline needs, plus an exclusive per-catalog lease.
//! [`HistoryStore`] persists the bounded audit log used by restore.
//! Backends: [`memory::InMemoryStore`] here, SQLite in the host crate.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{SyncError, SyncResult};
use crate::models::{CatalogEntry, EntryPatch, HistoryEntry};

/// Keyed catalog storage.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_entries`](CatalogStore::list_entries) | Full snapshot read |
/// | [`insert_entry`](CatalogStore::insert_entry) | Create one entry |
/// | [`update_entry`](CatalogStore::update_entry) | Patch one entry by id |
/// | [`acquire_lease`](CatalogStore::acquire_lease) | Take the exclusive run lease |
/// | [`release_lease`](CatalogStore::release_lease) | Give the lease back |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every entry currently in the catalog.
    async fn list_entries(&self) -> Result<Vec<CatalogEntry>>;

    /// Insert a new entry. Fails if `entry.id` already exists.
    async fn insert_entry(&self, entry: &CatalogEntry) -> Result<()>;

    /// Apply `patch` to the entry keyed by `id`. Fails if it does not exist.
    async fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<()>;

    /// Try to take the catalog lease for `holder`.
    ///
    /// Returns `Ok(None)` when acquired, `Ok(Some(current_holder))` when
    /// another holder owns it.
    async fn acquire_lease(&self, holder: &str) -> Result<Option<String>>;

    /// Release the lease if `holder` owns it.
    async fn release_lease(&self, holder: &str) -> Result<()>;
}

/// Storage for [`HistoryEntry`] records.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn insert_history(&self, entry: &HistoryEntry) -> Result<()>;

    /// All retained entries, newest `uploaded_at` first.
    async fn list_history(&self) -> Result<Vec<HistoryEntry>>;

    async fn get_history(&self, id: &str) -> Result<Option<HistoryEntry>>;

    async fn delete_history(&self, id: &str) -> Result<()>;

    async fn mark_restored(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Run `work` while holding the catalog lease for `holder`.
///
/// The lease is released whether `work` succeeds or fails; a release
/// failure is logged and does not mask the result of `work`.
pub async fn with_lease<S, T, F, Fut>(store: &S, holder: &str, work: F) -> SyncResult<T>
where
    S: CatalogStore + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    match store.acquire_lease(holder).await.map_err(SyncError::Store)? {
        None => {}
        Some(current) => return Err(SyncError::LeaseHeld { holder: current }),
    }
    tracing::debug!(holder, "catalog lease acquired");

    let result = work().await;

    match store.release_lease(holder).await {
        Ok(()) => tracing::debug!(holder, "catalog lease released"),
        Err(e) => tracing::warn!(holder, error = %e, "failed to release catalog lease"),
    }
    result
}
