//! Directory backup watcher.
//!
//! Watches one directory and mirrors every qualifying change to an
//! S3-compatible object store as a timestamped, versioned object:
//! - `classifier`: per-path state machine deciding when a notification warrants a backup
//! - `pipeline`: stat, upload, and record one backup
//! - `ledger` / `journal`: attempt history, statistics, and the daily JSON journal
//! - `watch` / `orchestrator`: the `notify` watcher and the per-path worker pool

pub mod classifier;
pub mod config;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod watch;

pub use classifier::{Classifier, ClassifierConfig, Decision, IgnoreReason};
pub use config::Config;
pub use error::{Result, WatcherError};
pub use journal::AttemptJournal;
pub use ledger::{Ledger, LedgerCounters, LedgerExport, LedgerSnapshot};
pub use orchestrator::{bootstrap, handle_event, WatchOrchestrator};
pub use pipeline::BackupPipeline;
pub use watch::DirectoryWatcher;
