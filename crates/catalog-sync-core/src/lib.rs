//! # Catalog Sync Core
//!
//! The reconciliation engine for Catalog Sync: feed row normalization,
//! tiered key matching, field diffing, staged apply, absence-driven stock
//! zeroing, and the bounded history log with point-in-time restore.
//!
//! This crate contains no tokio runtime, sqlx, or filesystem I/O. Storage
//! is reached through the [`store::CatalogStore`] and [`store::HistoryStore`]
//! traits; [`store::memory::InMemoryStore`] backs tests and embedders.
//!
//! ```text
//! FeedRow ─▶ normalize ─▶ index/resolve ─▶ diff ─▶ pipeline ─▶ stock_sync
//!                                                     │
//!                                                     ▼
//!                                         history ◀──▶ restore
//! ```

pub mod diff;
pub mod error;
pub mod history;
pub mod index;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod resolve;
pub mod restore;
pub mod stock_sync;
pub mod store;

pub use error::{SyncError, SyncResult};
pub use pipeline::{CatalogDefaults, Reconciler, RunOptions, RunOutcome};
pub use restore::{RestoreEngine, RestoreReport};
