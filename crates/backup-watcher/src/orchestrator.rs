//! Watch Orchestrator: routes notifications through the classifier and the
//! backup pipeline, and owns start/stop.
//!
//! ```text
//! notify thread ──► dispatcher ──hash(path) % N──► worker[i]: classify → execute
//! ```
//!
//! All events for one path land on the same worker, so classification and the
//! resulting backup for a path never interleave with another event for it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use backup_core::{BackupAttempt, BucketStatus, ObjectStore, WatchEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::classifier::{Classifier, Decision, IgnoreReason};
use crate::error::{Result, WatcherError};
use crate::ledger::{Ledger, LedgerSnapshot};
use crate::pipeline::BackupPipeline;
use crate::watch::DirectoryWatcher;

pub struct WatchOrchestrator {
    classifier: Arc<Classifier>,
    pipeline: Arc<BackupPipeline>,
    ledger: Arc<Ledger>,
    workers: usize,
    stats_file: Option<PathBuf>,
}

impl WatchOrchestrator {
    pub fn new(classifier: Classifier, pipeline: BackupPipeline, workers: usize) -> Self {
        let ledger = pipeline.ledger().clone();
        Self {
            classifier: Arc::new(classifier),
            pipeline: Arc::new(pipeline),
            ledger,
            workers: workers.max(1),
            stats_file: None,
        }
    }

    /// Write the ledger export to `path` on shutdown.
    pub fn with_stats_file(mut self, path: Option<PathBuf>) -> Self {
        self.stats_file = path;
        self
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Watch `dir` until `shutdown` turns true, then drain and report.
    pub async fn run(
        self,
        dir: &Path,
        shutdown: watch::Receiver<bool>,
    ) -> Result<LedgerSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = DirectoryWatcher::start(dir, tx)?;
        info!("Watcher service started and running.");
        Ok(self.process(rx, shutdown, Some(watcher)).await)
    }

    /// Process events from an arbitrary source until it closes or `shutdown` turns true.
    pub async fn run_with_events(
        self,
        events: mpsc::UnboundedReceiver<WatchEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> LedgerSnapshot {
        self.process(events, shutdown, None).await
    }

    async fn process(
        self,
        mut events: mpsc::UnboundedReceiver<WatchEvent>,
        mut shutdown: watch::Receiver<bool>,
        watcher: Option<DirectoryWatcher>,
    ) -> LedgerSnapshot {
        let (queues, workers) = self.spawn_workers();
        let mut shutdown_closed = false;

        loop {
            tokio::select! {
                requested = shutdown_requested(&mut shutdown), if !shutdown_closed => {
                    if requested {
                        warn!("Interrupt received. Stopping watcher...");
                        break;
                    }
                    // Sender gone: no shutdown can arrive any more, keep serving events.
                    shutdown_closed = true;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        let shard = shard_for(&event.path, queues.len());
                        if queues[shard].send(event).is_err() {
                            error!(shard, "Backup worker is gone, dropping event");
                        }
                    }
                    None => {
                        info!("Event source closed. Stopping watcher...");
                        break;
                    }
                },
            }
        }

        if let Some(watcher) = watcher {
            watcher.stop();
        }

        // Closing the queues lets each worker finish what it already has.
        drop(queues);
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Backup worker failed: {}", e);
            }
        }

        let snapshot = self.ledger.snapshot();
        snapshot.log();
        self.write_stats_file().await;
        snapshot
    }

    fn spawn_workers(&self) -> (Vec<mpsc::UnboundedSender<WatchEvent>>, Vec<JoinHandle<()>>) {
        (0..self.workers)
            .map(|id| {
                let (tx, mut rx) = mpsc::unbounded_channel::<WatchEvent>();
                let classifier = self.classifier.clone();
                let pipeline = self.pipeline.clone();
                let handle = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        handle_event(&classifier, &pipeline, event).await;
                    }
                    debug!(worker = id, "Backup worker drained");
                });
                (tx, handle)
            })
            .unzip()
    }

    async fn write_stats_file(&self) {
        let Some(path) = &self.stats_file else {
            return;
        };
        let json = match self.ledger.export_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize ledger export: {}", e);
                return;
            }
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Failed to create {}: {}", parent.display(), e);
                return;
            }
        }
        match tokio::fs::write(path, json).await {
            Ok(()) => info!("Ledger export written to {}", path.display()),
            Err(e) => warn!("Failed to write ledger export {}: {}", path.display(), e),
        }
    }
}

/// Confirm or create the target bucket before anything is watched.
///
/// Failure here is the one fatal condition of the watcher; it is logged as
/// `CRITICAL` and returned for `main` to exit on.
pub async fn bootstrap(store: &dyn ObjectStore) -> Result<BucketStatus> {
    info!("Connecting to {} object store...", store.store_name());
    match store.ensure_bucket_exists().await {
        Ok(status) => {
            info!("Object store connection established successfully.");
            Ok(status)
        }
        Err(e) => {
            error!("CRITICAL: Failed to connect or create bucket: {}", e);
            Err(WatcherError::Bootstrap(e))
        }
    }
}

/// Resolves to `true` once shutdown is requested, `false` if the sender is dropped first.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) -> bool {
    shutdown.wait_for(|&stop| stop).await.is_ok()
}

/// Classify one event and run the pipeline when it qualifies.
pub async fn handle_event(
    classifier: &Classifier,
    pipeline: &BackupPipeline,
    event: WatchEvent,
) -> Option<BackupAttempt> {
    let decision = classifier.classify(&event);
    log_decision(&event, &decision);
    match decision {
        Decision::BackupNow { path, .. } => pipeline.execute(&path).await,
        Decision::Ignore(_) => None,
    }
}

fn log_decision(event: &WatchEvent, decision: &Decision) {
    let path = event.path.display();
    match decision {
        Decision::Ignore(IgnoreReason::RestoreTemp) => {
            debug!("Skipping temporary file during restore: {}", path)
        }
        Decision::Ignore(IgnoreReason::AwaitingFirstModify) => {
            info!("File initial create (skipped): {}", path)
        }
        Decision::Ignore(IgnoreReason::Debounced) => {
            debug!("Skipping duplicate modification of {}", path)
        }
        Decision::Ignore(IgnoreReason::Deleted) => warn!("File DELETED: {}", path),
        Decision::BackupNow { forced: true, .. } => warn!(
            "File {} created but no modification seen. Forcing backup.",
            path
        ),
        Decision::BackupNow {
            first_modify_after_creation: true,
            ..
        } => info!("File initial modified: {}", path),
        Decision::BackupNow { .. } => info!("File {}: {}", event.kind.as_str(), path),
    }
}

fn shard_for(path: &Path, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}
