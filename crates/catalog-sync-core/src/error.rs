//! Fatal run errors.
//!
//! Row-level problems (missing fields, ambiguous matches, a single failed
//! write) never surface here; they are recorded in the
//! [`ReconciliationReport`](crate::models::ReconciliationReport). A
//! [`SyncError`] means the run as a whole could not proceed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The feed contained no data rows.
    #[error("feed is empty: no data rows to reconcile")]
    EmptyFeed,

    /// The run was misconfigured (unknown feed format, bad options).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Another run holds the catalog lease.
    #[error("catalog is locked by another run (holder: {holder})")]
    LeaseHeld { holder: String },

    /// No history entry with this id is retained.
    #[error("history entry not found: {0}")]
    HistoryNotFound(String),

    /// The catalog store could not be read or the lease could not be managed.
    #[error("catalog store unavailable: {0:#}")]
    Store(#[source] anyhow::Error),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
