use std::path::PathBuf;
use std::time::Duration;

use backup_store_s3::S3Config;
use clap::{ArgAction, Parser};

use crate::classifier::ClassifierConfig;

/// Configuration for the backup watcher.
#[derive(Parser, Debug, Clone)]
#[command(name = "backup-watcher")]
#[command(about = "Mirrors changes in a directory to an S3-compatible object store as versioned objects")]
pub struct Config {
    /// Directory to watch (non-recursive)
    #[arg(long, default_value = "/mnt/source", env = "WATCH_DIR")]
    pub watch_dir: PathBuf,

    /// Directory for the text log and the JSON attempt journal
    #[arg(long, default_value = "./logs", env = "LOG_DIR")]
    pub log_dir: PathBuf,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Also log to the console
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "LOG_CONSOLE")]
    pub log_console: bool,

    /// How long a created file waits for its first write before a late write is forced through (ms)
    #[arg(long, default_value = "2000", env = "CREATION_SKIP_MS")]
    pub creation_skip_ms: u64,

    /// Minimum time between two backups of the same file (ms)
    #[arg(long, default_value = "1000", env = "DEBOUNCE_MS")]
    pub debounce_ms: u64,

    /// Backup workers; events for one path always go to the same worker
    #[arg(long, default_value = "4", env = "BACKUP_WORKERS", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// Write the ledger export (statistics and attempts) to this file on shutdown
    #[arg(long, env = "STATS_FILE")]
    pub stats_file: Option<PathBuf>,

    #[command(flatten)]
    pub store: S3Config,
}

impl Config {
    pub fn classifier(&self) -> ClassifierConfig {
        ClassifierConfig {
            creation_skip: Duration::from_millis(self.creation_skip_ms),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }
}
