//! # Catalog Sync
//!
//! Reconciles a retail product catalog against tabular supplier feeds.
//!
//! The engine itself lives in `catalog-sync-core`; this crate is the native
//! host around it: configuration, the SQLite store, feed file readers and
//! the `csync` command implementations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ Feed reader  │──▶│ Reconciler (core) │──▶│   SQLite     │
//! │ CSV/TSV/JSON │   │ match+diff+apply │   │ catalog+hist │
//! └──────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                  │
//!                                 RestoreEngine ◀──┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite catalog and history store |
//! | [`feed`] | Feed file readers |
//! | [`reconcile`] | `csync reconcile` |
//! | [`history`] | `csync history` and `csync restore` |
//! | [`report`] | Human-readable output |
//! | [`stats`] | `csync stats` |
//! | [`export`] | `csync export` |

pub mod config;
pub mod db;
pub mod export;
pub mod feed;
pub mod history;
pub mod migrate;
pub mod reconcile;
pub mod report;
pub mod sqlite_store;
pub mod stats;
