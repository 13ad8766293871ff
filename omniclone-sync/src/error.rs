//! Error types for omniclone-sync.

use std::path::PathBuf;

use thiserror::Error;

use omniclone_core::ConfigError;

use crate::lock::LockOwner;

/// Errors from [`crate::lock::LockManager::acquire`].
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run holds the lock for this scope. Expected, not a crash.
    #[error("already locked: {path} exists (another run in progress; delete it if stale)")]
    AlreadyLocked {
        path: PathBuf,
        owner: Option<LockOwner>,
    },

    /// The lock directory could not be created for a reason other than
    /// already existing.
    #[error("cannot create lock at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// All errors that abort an orchestration pass.
///
/// Per-target invocation failures are not errors; they become outcome
/// records in [`crate::RunSummary`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// A filter file exists but cannot be read.
    #[error("filter file {path} is unreadable: {source}")]
    UnreadableFilter {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
