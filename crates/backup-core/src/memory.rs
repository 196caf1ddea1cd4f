//! In-memory `ObjectStore` for tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Local, Utc};

use crate::error::StoreError;
use crate::naming::VersionedKey;
use crate::store::{BucketStatus, ObjectStore, ObjectVersion, UploadReceipt};

/// In-memory object store with failure injection.
#[derive(Debug)]
pub struct MemoryStore {
    bucket: String,
    bucket_exists: Mutex<bool>,
    bucket_error: Option<String>,
    upload_error: Mutex<Option<String>>,
    objects: Mutex<BTreeMap<String, ObjectVersion>>,
    contents: Mutex<BTreeMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<PathBuf>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A store whose bucket already exists.
    pub fn new() -> Self {
        Self {
            bucket: "memory".to_string(),
            bucket_exists: Mutex::new(true),
            bucket_error: None,
            upload_error: Mutex::new(None),
            objects: Mutex::new(BTreeMap::new()),
            contents: Mutex::new(BTreeMap::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// A store whose bucket has to be created on first check.
    pub fn without_bucket() -> Self {
        let store = Self::new();
        *store.bucket_exists.lock().expect("memory store poisoned") = false;
        store
    }

    /// A store whose bucket can never be reached.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            bucket_error: Some(message.into()),
            ..Self::new()
        }
    }

    /// Make every subsequent upload fail with `message`.
    pub fn fail_uploads(&self, message: impl Into<String>) {
        *self.upload_error.lock().expect("memory store poisoned") = Some(message.into());
    }

    /// Seed an object directly.
    pub fn insert(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().expect("memory store poisoned").insert(
            key.to_string(),
            ObjectVersion {
                key: key.to_string(),
                last_modified: Some(Utc::now()),
                size: data.len() as u64,
            },
        );
        self.contents
            .lock()
            .expect("memory store poisoned")
            .insert(key.to_string(), data);
    }

    /// Stored bytes for a key.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.contents
            .lock()
            .expect("memory store poisoned")
            .get(key)
            .cloned()
    }

    /// Paths passed to `upload`, including failed ones.
    pub fn uploaded_paths(&self) -> Vec<PathBuf> {
        self.uploads.lock().expect("memory store poisoned").clone()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().expect("memory store poisoned").len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn store_name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_bucket_exists(&self) -> Result<BucketStatus, StoreError> {
        if let Some(message) = &self.bucket_error {
            return Err(StoreError::Bucket(message.clone()));
        }
        let mut exists = self.bucket_exists.lock().expect("memory store poisoned");
        if *exists {
            Ok(BucketStatus::Existing)
        } else {
            *exists = true;
            Ok(BucketStatus::Created)
        }
    }

    async fn upload(&self, path: &Path) -> Result<UploadReceipt, StoreError> {
        self.uploads
            .lock()
            .expect("memory store poisoned")
            .push(path.to_path_buf());

        let upload_error = self
            .upload_error
            .lock()
            .expect("memory store poisoned")
            .clone();
        if let Some(message) = upload_error {
            return Err(StoreError::Service(message));
        }

        let data = tokio::fs::read(path).await?;
        let key = VersionedKey::for_path(path, Local::now().naive_local())?.to_string();
        if self
            .contents
            .lock()
            .expect("memory store poisoned")
            .contains_key(&key)
        {
            return Err(StoreError::Conflict(key));
        }
        self.insert(&key, data);

        Ok(UploadReceipt {
            destination: format!("memory://{}/{}", self.bucket, key),
            key,
        })
    }

    async fn download(&self, key: &str, destination: &Path) -> Result<(), StoreError> {
        let data = self
            .object(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        tokio::fs::write(destination, data).await?;
        Ok(())
    }

    async fn list_versions(&self) -> Result<Vec<ObjectVersion>, StoreError> {
        Ok(self
            .objects
            .lock()
            .expect("memory store poisoned")
            .values()
            .cloned()
            .collect())
    }
}
