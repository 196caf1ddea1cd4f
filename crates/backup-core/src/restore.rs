//! Restore protocol shared by the watcher and the admin tooling.
//!
//! The admin side downloads a stored version to `{name}.RESTORE_TEMP` and then
//! renames it to `{name}`. The watcher ignores every path whose final component
//! ends with [`RESTORE_TEMP_SUFFIX`], so only the rename becomes visible to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::RestoreError;
use crate::naming::original_file_name;
use crate::store::ObjectStore;

/// Suffix marking a file that is still being written by a restore.
pub const RESTORE_TEMP_SUFFIX: &str = ".RESTORE_TEMP";

/// True when the final path component carries the restore-temporary suffix.
pub fn is_restore_temp(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(RESTORE_TEMP_SUFFIX))
        .unwrap_or(false)
}

/// Temporary path a restore writes to before renaming into `final_path`.
pub fn restore_temp_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(RESTORE_TEMP_SUFFIX);
    final_path.with_file_name(name)
}

/// A version restored into the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoredFile {
    pub key: String,
    pub file_name: String,
    pub path: PathBuf,
}

/// Restores stored versions into the watched directory via temp-file-then-rename.
pub struct RestoreCoordinator {
    store: Arc<dyn ObjectStore>,
    source_dir: PathBuf,
}

impl RestoreCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            source_dir: source_dir.into(),
        }
    }

    /// Restore `key` into the source directory.
    ///
    /// The file name defaults to the original name encoded in the versioned key.
    #[instrument(skip(self), level = "debug")]
    pub async fn restore(
        &self,
        key: &str,
        target_name: Option<&str>,
    ) -> Result<RestoredFile, RestoreError> {
        let file_name = match target_name {
            Some(name) => name.to_string(),
            None => original_file_name(key),
        };
        validate_file_name(&file_name)?;

        let final_path = self.source_dir.join(&file_name);
        let temp_path = restore_temp_path(&final_path);

        if let Err(e) = self.store.download(key, &temp_path).await {
            remove_leftover(&temp_path).await;
            return Err(RestoreError::Download(e));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            remove_leftover(&temp_path).await;
            return Err(RestoreError::Rename(e));
        }

        info!(
            "File {} restored successfully from backup key {}",
            file_name, key
        );
        Ok(RestoredFile {
            key: key.to_string(),
            file_name,
            path: final_path,
        })
    }
}

fn validate_file_name(name: &str) -> Result<(), RestoreError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.ends_with(RESTORE_TEMP_SUFFIX);
    if invalid {
        return Err(RestoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

async fn remove_leftover(temp_path: &Path) {
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Failed to remove temporary restore file {}: {}",
            temp_path.display(),
            e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use tempfile::TempDir;

    #[test]
    fn test_is_restore_temp() {
        assert!(is_restore_temp(Path::new("/src/c.txt.RESTORE_TEMP")));
        assert!(is_restore_temp(Path::new(".RESTORE_TEMP")));
        assert!(!is_restore_temp(Path::new("/src/c.txt")));
        assert!(!is_restore_temp(Path::new("/src/c.RESTORE_TEMP.txt")));
        assert!(!is_restore_temp(Path::new("/src.RESTORE_TEMP/c.txt")));
        assert!(!is_restore_temp(Path::new("/")));
    }

    #[test]
    fn test_restore_temp_path() {
        let temp = restore_temp_path(Path::new("/src/report.pdf"));
        assert_eq!(temp, PathBuf::from("/src/report.pdf.RESTORE_TEMP"));
        assert!(is_restore_temp(&temp));
    }

    #[tokio::test]
    async fn test_restore_uses_original_name() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("report_20251214_133045.pdf", b"version one".to_vec());

        let coordinator = RestoreCoordinator::new(store, dir.path());
        let restored = coordinator
            .restore("report_20251214_133045.pdf", None)
            .await
            .unwrap();

        assert_eq!(restored.file_name, "report.pdf");
        assert_eq!(restored.path, dir.path().join("report.pdf"));
        let content = tokio::fs::read(&restored.path).await.unwrap();
        assert_eq!(content, b"version one");
        assert!(!restore_temp_path(&restored.path).exists());
    }

    #[tokio::test]
    async fn test_restore_with_explicit_name_overwrites() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("copy.txt"), b"current")
            .await
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        store.insert("notes_20251214_133045.txt", b"older".to_vec());

        let coordinator = RestoreCoordinator::new(store, dir.path());
        let restored = coordinator
            .restore("notes_20251214_133045.txt", Some("copy.txt"))
            .await
            .unwrap();

        let content = tokio::fs::read(&restored.path).await.unwrap();
        assert_eq!(content, b"older");
    }

    #[tokio::test]
    async fn test_restore_missing_key_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let coordinator = RestoreCoordinator::new(Arc::new(MemoryStore::new()), dir.path());

        let err = coordinator
            .restore("ghost_20251214_133045.txt", None)
            .await
            .unwrap_err();

        assert!(matches!(err, RestoreError::Download(_)));
        assert!(!dir.path().join("ghost.txt.RESTORE_TEMP").exists());
        assert!(!dir.path().join("ghost.txt").exists());
    }

    #[tokio::test]
    async fn test_restore_rejects_bad_names() {
        let dir = TempDir::new().unwrap();
        let coordinator = RestoreCoordinator::new(Arc::new(MemoryStore::new()), dir.path());

        for name in ["", "..", "../escape.txt", "x.RESTORE_TEMP"] {
            let err = coordinator.restore("k", Some(name)).await.unwrap_err();
            assert!(matches!(err, RestoreError::InvalidName(_)), "{name}");
        }
    }
}
