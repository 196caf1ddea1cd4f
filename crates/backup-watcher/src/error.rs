//! Error types for the watcher process.

use backup_core::StoreError;

/// Watcher-level errors. Per-file backup failures are never errors; they are
/// recorded as failed attempts in the ledger.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("Filesystem watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Object store bootstrap failed: {0}")]
    Bootstrap(#[source] StoreError),
}

pub type Result<T> = std::result::Result<T, WatcherError>;
