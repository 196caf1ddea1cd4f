//! Filesystem-watch collaborator: a non-recursive `notify` watcher that forwards
//! translated `WatchEvent`s over a channel.

use std::path::{Path, PathBuf};
use std::time::Instant;

use backup_core::{EventKind, WatchEvent};
use notify::event::{ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Running directory watch. Dropping it stops the underlying watcher.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    dir: PathBuf,
}

impl DirectoryWatcher {
    /// Start watching `dir` (non-recursive), sending events to `tx`.
    pub fn start(dir: &Path, tx: mpsc::UnboundedSender<WatchEvent>) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    for watch_event in translate(event, Instant::now()) {
                        // Receiver gone means the orchestrator is shutting down.
                        if tx.send(watch_event).is_err() {
                            break;
                        }
                    }
                }
                Err(e) => warn!("Filesystem watch error: {}", e),
            },
        )?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("Watching directory {}", dir.display());

        Ok(Self {
            watcher,
            dir: dir.to_path_buf(),
        })
    }

    /// Stop delivering events.
    pub fn stop(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.dir) {
            debug!("Unwatch of {} failed: {}", self.dir.display(), e);
        }
        info!("Stopped watching {}", self.dir.display());
    }
}

/// Translate one `notify` event into zero or more `WatchEvent`s.
///
/// A file renamed into place counts as a creation and a file renamed away as
/// a deletion, including renames whose direction the backend does not report. Access and unclassified events are dropped, as are
/// creations and modifications of directories.
pub fn translate(event: notify::Event, observed_at: Instant) -> Vec<WatchEvent> {
    use notify::EventKind as Kind;

    let mapped: Vec<(PathBuf, EventKind)> = match event.kind {
        Kind::Create(_) => with_kind(event.paths, EventKind::Created),
        Kind::Remove(_) => with_kind(event.paths, EventKind::Deleted),
        Kind::Modify(ModifyKind::Name(RenameMode::To)) => {
            with_kind(event.paths, EventKind::Created)
        }
        Kind::Modify(ModifyKind::Name(RenameMode::From)) => {
            with_kind(event.paths, EventKind::Deleted)
        }
        Kind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            let mut mapped = Vec::with_capacity(2);
            if let Some(from) = paths.next() {
                mapped.push((from, EventKind::Deleted));
            }
            if let Some(to) = paths.next() {
                mapped.push((to, EventKind::Created));
            }
            mapped
        }
        // Backends that cannot tell the two ends apart (FSEvents) report `Any`;
        // a path that still exists was renamed in, otherwise it was renamed away.
        Kind::Modify(ModifyKind::Name(_)) => event
            .paths
            .into_iter()
            .map(|path| {
                let kind = if path.exists() {
                    EventKind::Created
                } else {
                    EventKind::Deleted
                };
                (path, kind)
            })
            .collect(),
        Kind::Modify(_) => with_kind(event.paths, EventKind::Modified),
        other => {
            debug!("Ignoring advisory notification {:?} for {:?}", other, event.paths);
            Vec::new()
        }
    };

    mapped
        .into_iter()
        .filter(|(path, kind)| *kind == EventKind::Deleted || !path.is_dir())
        .map(|(path, kind)| WatchEvent::at(path, kind, observed_at))
        .collect()
}

fn with_kind(paths: Vec<PathBuf>, kind: EventKind) -> Vec<(PathBuf, EventKind)> {
    paths.into_iter().map(|p| (p, kind)).collect()
}
