/// Errors raised by an object-store collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Bucket unavailable: {0}")]
    Bucket(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    Conflict(String),

    #[error("Storage service error: {0}")]
    Service(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Errors raised while restoring a stored version into the watched directory.
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error("Invalid restore target name: {0:?}")]
    InvalidName(String),

    #[error("Download failed: {0}")]
    Download(#[from] StoreError),

    #[error("Failed to move restored file into place: {0}")]
    Rename(#[source] std::io::Error),
}
