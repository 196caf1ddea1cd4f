use std::path::Path;
use std::sync::Arc;

use backup_core::{group_versions, ObjectStore, RestoreCoordinator, RestoredFile};
use serde_json::Value;
use tracing::info;

/// Stored versions as JSON: a flat array, or an object keyed by original file name.
pub async fn list(store: &dyn ObjectStore, grouped: bool) -> anyhow::Result<Value> {
    let versions = store.list_versions().await?;
    info!("Found {} stored versions", versions.len());

    let listing = if grouped {
        serde_json::to_value(group_versions(versions))?
    } else {
        serde_json::to_value(versions)?
    };
    Ok(listing)
}

pub async fn restore(
    store: Arc<dyn ObjectStore>,
    source_dir: &Path,
    key: &str,
    target_name: Option<&str>,
) -> anyhow::Result<RestoredFile> {
    let coordinator = RestoreCoordinator::new(store, source_dir);
    Ok(coordinator.restore(key, target_name).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_core::memory::MemoryStore;
    use tempfile::TempDir;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.insert("report_20251214_133045.pdf", b"v2".to_vec());
        store.insert("report_20251201_090000.pdf", b"v1".to_vec());
        store.insert("notes_20251210_120000.txt", b"notes".to_vec());
        store
    }

    #[tokio::test]
    async fn test_list_flat() {
        let store = seeded_store();
        let listing = list(&*store, false).await.unwrap();

        let keys: Vec<&str> = listing
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&"notes_20251210_120000.txt"));
    }

    #[tokio::test]
    async fn test_list_grouped_oldest_first() {
        let store = seeded_store();
        let listing = list(&*store, true).await.unwrap();

        let reports = listing["report.pdf"].as_array().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0]["key"], "report_20251201_090000.pdf");
        assert_eq!(reports[1]["key"], "report_20251214_133045.pdf");
        assert_eq!(listing["notes.txt"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_writes_original_name() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store();

        let restored = restore(store, dir.path(), "report_20251201_090000.pdf", None)
            .await
            .unwrap();

        assert_eq!(restored.file_name, "report.pdf");
        assert_eq!(std::fs::read(dir.path().join("report.pdf")).unwrap(), b"v1");
    }

    #[tokio::test]
    async fn test_restore_missing_key_fails() {
        let dir = TempDir::new().unwrap();
        let result = restore(seeded_store(), dir.path(), "missing_20250101_000000.txt", None).await;

        assert!(result.is_err());
        assert!(!dir.path().join("missing.txt").exists());
    }
}
