use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Result of the startup bucket check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    /// The bucket was already there
    Existing,
    /// The bucket was missing and has been created
    Created,
}

/// Where an uploaded file ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Versioned object key (`{base}_{YYYYMMDD_HHMMSS}{ext}`)
    pub key: String,
    /// Human-readable destination URI, e.g. `s3://bucket/key`
    pub destination: String,
}

/// One stored object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectVersion {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

/// Object-store collaborator used by the watcher and the admin tooling.
///
/// Implementations own their own transport concerns (timeouts, retries for
/// transient failures). Every upload must land under a fresh versioned key;
/// an existing object is never replaced.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the store name for logging.
    fn store_name(&self) -> &'static str;

    /// Confirm the target bucket exists, creating it when missing.
    async fn ensure_bucket_exists(&self) -> Result<BucketStatus, StoreError>;

    /// Upload a local file under a new versioned key.
    async fn upload(&self, path: &Path) -> Result<UploadReceipt, StoreError>;

    /// Download an object to a local path, overwriting it if present.
    async fn download(&self, key: &str, destination: &Path) -> Result<(), StoreError>;

    /// List every stored object.
    async fn list_versions(&self) -> Result<Vec<ObjectVersion>, StoreError>;
}
