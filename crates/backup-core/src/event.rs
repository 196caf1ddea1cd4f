use std::path::PathBuf;
use std::time::Instant;

/// Kind of change reported by the filesystem-watch collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Deleted => "deleted",
        }
    }
}

/// A single raw filesystem notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Path that changed
    pub path: PathBuf,
    /// Type of change
    pub kind: EventKind,
    /// When the notification was observed
    pub observed_at: Instant,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: EventKind) -> Self {
        Self::at(path, kind, Instant::now())
    }

    pub fn at(path: impl Into<PathBuf>, kind: EventKind, observed_at: Instant) -> Self {
        Self {
            path: path.into(),
            kind,
            observed_at,
        }
    }
}
