//! In-memory [`CatalogStore`] + [`HistoryStore`] for testing and embedding.
//!
//! Uses `Vec` and `HashSet` behind `std::sync::RwLock` for thread safety.
//! Entries keep insertion order so snapshots are deterministic. Write
//! failures can be injected per entry id to exercise the pipeline's
//! per-change error recovery.

use std::collections::HashSet;
use std::sync::{Mutex, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{CatalogEntry, EntryPatch, HistoryEntry};

use super::{CatalogStore, HistoryStore};

/// In-memory store for tests and embedders.
pub struct InMemoryStore {
    entries: RwLock<Vec<CatalogEntry>>,
    history: RwLock<Vec<HistoryEntry>>,
    lease: Mutex<Option<String>>,
    failing_ids: RwLock<HashSet<String>>,
    fail_history: RwLock<bool>,
    fail_history_deletes: RwLock<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            lease: Mutex::new(None),
            failing_ids: RwLock::new(HashSet::new()),
            fail_history: RwLock::new(false),
            fail_history_deletes: RwLock::new(false),
        }
    }

    /// A store pre-populated with `entries`.
    pub fn with_entries(entries: Vec<CatalogEntry>) -> Self {
        let store = Self::new();
        *store.entries.write().unwrap() = entries;
        store
    }

    /// Synchronous snapshot, for assertions.
    pub fn snapshot(&self) -> Vec<CatalogEntry> {
        self.entries.read().unwrap().clone()
    }

    pub fn get(&self, id: &str) -> Option<CatalogEntry> {
        self.entries
            .read()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn history_len(&self) -> usize {
        self.history.read().unwrap().len()
    }

    /// Make every insert or update touching `id` fail.
    pub fn fail_writes_for(&self, id: &str) {
        self.failing_ids.write().unwrap().insert(id.to_string());
    }

    /// Make history inserts fail.
    pub fn fail_history_writes(&self, fail: bool) {
        *self.fail_history.write().unwrap() = fail;
    }

    /// Make history deletes (pruning) fail.
    pub fn fail_history_deletes(&self, fail: bool) {
        *self.fail_history_deletes.write().unwrap() = fail;
    }

    /// Current lease holder, if any.
    pub fn lease_holder(&self) -> Option<String> {
        self.lease.lock().unwrap().clone()
    }

    fn check_writable(&self, id: &str) -> Result<()> {
        if self.failing_ids.read().unwrap().contains(id) {
            bail!("injected write failure for entry {}", id);
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn list_entries(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.snapshot())
    }

    async fn insert_entry(&self, entry: &CatalogEntry) -> Result<()> {
        self.check_writable(&entry.id)?;
        let mut entries = self.entries.write().unwrap();
        if entries.iter().any(|e| e.id == entry.id) {
            bail!("entry {} already exists", entry.id);
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn update_entry(&self, id: &str, patch: &EntryPatch) -> Result<()> {
        self.check_writable(id)?;
        let mut entries = self.entries.write().unwrap();
        match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                patch.apply_to(entry);
                Ok(())
            }
            None => bail!("entry {} not found", id),
        }
    }

    async fn acquire_lease(&self, holder: &str) -> Result<Option<String>> {
        let mut lease = self.lease.lock().unwrap();
        match lease.as_deref() {
            Some(current) if current != holder => Ok(Some(current.to_string())),
            _ => {
                *lease = Some(holder.to_string());
                Ok(None)
            }
        }
    }

    async fn release_lease(&self, holder: &str) -> Result<()> {
        let mut lease = self.lease.lock().unwrap();
        if lease.as_deref() == Some(holder) {
            *lease = None;
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn insert_history(&self, entry: &HistoryEntry) -> Result<()> {
        if *self.fail_history.read().unwrap() {
            bail!("injected history write failure");
        }
        self.history.write().unwrap().push(entry.clone());
        Ok(())
    }

    async fn list_history(&self) -> Result<Vec<HistoryEntry>> {
        // Newest insert first among equal timestamps.
        let mut all: Vec<HistoryEntry> = self.history.read().unwrap().iter().rev().cloned().collect();
        all.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(all)
    }

    async fn get_history(&self, id: &str) -> Result<Option<HistoryEntry>> {
        Ok(self
            .history
            .read()
            .unwrap()
            .iter()
            .find(|h| h.id == id)
            .cloned())
    }

    async fn delete_history(&self, id: &str) -> Result<()> {
        if *self.fail_history_deletes.read().unwrap() {
            bail!("injected history delete failure");
        }
        self.history.write().unwrap().retain(|h| h.id != id);
        Ok(())
    }

    async fn mark_restored(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut history = self.history.write().unwrap();
        match history.iter_mut().find(|h| h.id == id) {
            Some(h) => {
                h.restored_at = Some(at);
                Ok(())
            }
            None => bail!("history entry {} not found", id),
        }
    }
}
