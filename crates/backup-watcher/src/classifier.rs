//! Event Classifier: decides, per raw notification, whether a path is backed up now.
//!
//! Per-path state lives in one `DashMap` so the pending-creation marker and the
//! last accepted backup time for a path are always read and written together
//! under the same shard lock.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use backup_core::{is_restore_temp, EventKind, WatchEvent};
use dashmap::DashMap;

/// Maximum time a created file waits for its first content write.
pub const DEFAULT_CREATION_SKIP: Duration = Duration::from_secs(2);
/// Minimum time between two accepted backups of the same path.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Timing windows used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub creation_skip: Duration,
    pub debounce: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            creation_skip: DEFAULT_CREATION_SKIP,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Why a notification did not trigger a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Path is a restore-temporary file written by the admin side
    RestoreTemp,
    /// Fresh creation; content may not be flushed yet
    AwaitingFirstModify,
    /// Another backup of this path was accepted less than the debounce window ago
    Debounced,
    /// Deletions are reported, never backed up
    Deleted,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::RestoreTemp => "restore-temp",
            IgnoreReason::AwaitingFirstModify => "awaiting-first-modify",
            IgnoreReason::Debounced => "debounced",
            IgnoreReason::Deleted => "deleted",
        }
    }
}

/// Classification of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Ignore(IgnoreReason),
    BackupNow {
        path: PathBuf,
        /// First modification seen after a creation (debounce bypassed)
        first_modify_after_creation: bool,
        /// The creation waited longer than the skip window before this modification
        forced: bool,
    },
}

impl Decision {
    pub fn is_backup(&self) -> bool {
        matches!(self, Decision::BackupNow { .. })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PathState {
    /// Set while the path awaits its first content-write notification
    pending_since: Option<Instant>,
    /// Last time a backup of this path was accepted
    last_accepted: Option<Instant>,
}

impl PathState {
    fn is_empty(&self) -> bool {
        self.pending_since.is_none() && self.last_accepted.is_none()
    }
}

/// Per-path state machine classifying notifications into ignore / back up now.
///
/// Decisions use the event's `observed_at` as "now", so classification is
/// deterministic given the event sequence. Callers must feed events for one
/// path in order from a single task.
#[derive(Debug, Default)]
pub struct Classifier {
    config: ClassifierConfig,
    paths: DashMap<PathBuf, PathState>,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            paths: DashMap::new(),
        }
    }

    /// Classify one notification, updating the per-path state.
    pub fn classify(&self, event: &WatchEvent) -> Decision {
        if is_restore_temp(&event.path) {
            return Decision::Ignore(IgnoreReason::RestoreTemp);
        }

        let now = event.observed_at;
        match event.kind {
            EventKind::Created => {
                self.paths.entry(event.path.clone()).or_default().pending_since = Some(now);
                Decision::Ignore(IgnoreReason::AwaitingFirstModify)
            }
            EventKind::Modified => self.classify_modified(event, now),
            EventKind::Deleted => {
                // Evict so deleted paths do not accumulate state.
                self.paths.remove(&event.path);
                Decision::Ignore(IgnoreReason::Deleted)
            }
        }
    }

    fn classify_modified(&self, event: &WatchEvent, now: Instant) -> Decision {
        let mut state = self.paths.entry(event.path.clone()).or_default();

        if let Some(created_at) = state.pending_since.take() {
            let forced = now.saturating_duration_since(created_at) > self.config.creation_skip;
            state.last_accepted = Some(now);
            return Decision::BackupNow {
                path: event.path.clone(),
                first_modify_after_creation: true,
                forced,
            };
        }

        if let Some(last) = state.last_accepted {
            if now.saturating_duration_since(last) < self.config.debounce {
                return Decision::Ignore(IgnoreReason::Debounced);
            }
        }

        state.last_accepted = Some(now);
        Decision::BackupNow {
            path: event.path.clone(),
            first_modify_after_creation: false,
            forced: false,
        }
    }

    /// True while `path` awaits its first modification after a creation.
    pub fn is_pending_creation(&self, path: &std::path::Path) -> bool {
        self.paths
            .get(path)
            .map(|s| s.pending_since.is_some())
            .unwrap_or(false)
    }

    /// Number of paths with live state.
    pub fn tracked_paths(&self) -> usize {
        self.paths.iter().filter(|e| !e.value().is_empty()).count()
    }
}
