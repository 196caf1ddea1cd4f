//! Backup Pipeline: executes one "back up now" decision.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backup_core::{format_duration, format_size, BackupAttempt, ObjectStore};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::journal::AttemptJournal;
use crate::ledger::Ledger;

/// Stat, upload, and record the outcome of a single backup.
///
/// Every collaborator failure becomes a `Failed` attempt. The pipeline never
/// retries; a later notification has to re-qualify the file.
pub struct BackupPipeline {
    store: Arc<dyn ObjectStore>,
    ledger: Arc<Ledger>,
    journal: Option<Arc<AttemptJournal>>,
}

impl BackupPipeline {
    pub fn new(store: Arc<dyn ObjectStore>, ledger: Arc<Ledger>) -> Self {
        Self {
            store,
            ledger,
            journal: None,
        }
    }

    /// Also append each attempt to a structured JSON journal.
    pub fn with_journal(mut self, journal: Arc<AttemptJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Back up `path`. Returns `None` when the file vanished before it could be read.
    #[instrument(skip(self), level = "debug")]
    pub async fn execute(&self, path: &Path) -> Option<BackupAttempt> {
        if !fs::try_exists(path).await.unwrap_or(false) {
            debug!("File {} vanished before backup, skipping", path.display());
            return None;
        }

        let size = match fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                let attempt = BackupAttempt::failed(
                    path,
                    format!("Failed to read file size: {}", e),
                    None,
                    Duration::ZERO,
                );
                return Some(self.complete(attempt).await);
            }
        };

        info!("Starting backup: {} (Size: {})", path.display(), format_size(size));
        let started = Instant::now();

        let attempt = match self.store.upload(path).await {
            Ok(receipt) => BackupAttempt::succeeded(path, receipt, size, started.elapsed()),
            Err(e) => BackupAttempt::failed(path, e.to_string(), Some(size), started.elapsed()),
        };

        Some(self.complete(attempt).await)
    }

    /// Log the outcome, record it in the ledger, and journal it.
    async fn complete(&self, attempt: BackupAttempt) -> BackupAttempt {
        log_outcome(&attempt);
        self.ledger.record(attempt.clone());

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&attempt.to_record()).await {
                warn!("Failed to write JSON log: {}", e);
            }
        }
        attempt
    }
}

fn log_outcome(attempt: &BackupAttempt) {
    if attempt.is_success() {
        info!(
            "Backup SUCCESS: {} -> {} | Size: {} | Duration: {}",
            attempt.path.display(),
            attempt.destination.as_deref().unwrap_or_default(),
            format_size(attempt.size_bytes.unwrap_or(0)),
            format_duration(attempt.duration)
        );
    } else {
        let size_info = attempt
            .size_bytes
            .map(|s| format!("Size: {} | ", format_size(s)))
            .unwrap_or_default();
        error!(
            "Backup FAILED: {} | {}Error: {}",
            attempt.path.display(),
            size_info,
            attempt.error.as_deref().unwrap_or("unknown error")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_core::memory::MemoryStore;
    use backup_core::{AttemptStatus, VersionedKey};
    use tempfile::TempDir;

    fn pipeline(store: Arc<MemoryStore>) -> BackupPipeline {
        BackupPipeline::new(store, Arc::new(Ledger::new()))
    }

    #[tokio::test]
    async fn test_successful_backup() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("report.pdf");
        tokio::fs::write(&file, vec![7u8; 1536]).await.unwrap();

        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());
        let attempt = pipeline.execute(&file).await.unwrap();

        assert_eq!(attempt.status, AttemptStatus::Success);
        assert_eq!(attempt.size_bytes, Some(1536));
        let key = attempt.destination_key.clone().unwrap();
        assert_eq!(VersionedKey::parse(&key).unwrap().original_name(), "report.pdf");
        assert_eq!(store.object(&key).unwrap().len(), 1536);

        let snapshot = pipeline.ledger().snapshot();
        assert_eq!((snapshot.total, snapshot.successful), (1, 1));
        assert_eq!(snapshot.total_bytes_formatted, "1.50 KB");
    }

    #[tokio::test]
    async fn test_vanished_file_records_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone());

        let attempt = pipeline.execute(&dir.path().join("gone.txt")).await;

        assert!(attempt.is_none());
        assert_eq!(store.upload_count(), 0);
        assert_eq!(pipeline.ledger().snapshot().total, 0);
    }

    #[tokio::test]
    async fn test_upload_failure_becomes_failed_attempt() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("d.txt");
        tokio::fs::write(&file, b"data").await.unwrap();

        let store = Arc::new(MemoryStore::new());
        store.fail_uploads("network unreachable");
        let pipeline = pipeline(store.clone());

        let attempt = pipeline.execute(&file).await.unwrap();

        assert_eq!(attempt.status, AttemptStatus::Failed);
        assert_eq!(attempt.size_bytes, Some(4));
        assert!(attempt.error.unwrap().contains("network unreachable"));
        // No retry inside the pipeline.
        assert_eq!(store.upload_count(), 1);

        let counters = pipeline.ledger().counters();
        assert_eq!((counters.total, counters.successful, counters.failed), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_attempts_are_journaled() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("j.txt");
        tokio::fs::write(&file, b"journal me").await.unwrap();

        let journal = Arc::new(AttemptJournal::new(dir.path().join("logs")));
        let pipeline = pipeline(Arc::new(MemoryStore::new())).with_journal(journal.clone());
        pipeline.execute(&file).await.unwrap();

        let records = journal.read_today().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttemptStatus::Success);
        assert_eq!(records[0].size_bytes, Some(10));
        assert!(records[0].destination.as_deref().unwrap().starts_with("memory://"));
    }
}
