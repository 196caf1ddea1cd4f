//! Tracing bootstrap: console output plus a daily-named plain-text log file.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Result, WatcherError};

/// Path of today's text log inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("backup_{}.log", Local::now().format("%Y%m%d")))
}

/// Translate a `LOG_LEVEL` value into a filter directive.
///
/// Accepts the tracing level names plus `WARNING`, `CRITICAL` and `FATAL`, in
/// any case. Values containing `=` or `,` are passed through as directives.
/// Any other bare word is rejected, since `EnvFilter` would read it as a
/// target name and silence every event.
pub fn level_directive(log_level: &str) -> Result<String> {
    let trimmed = log_level.trim();
    if trimmed.contains('=') || trimmed.contains(',') {
        return Ok(trimmed.to_string());
    }
    let level = match trimmed.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        "off" => "off",
        _ => {
            return Err(WatcherError::Logging(format!(
                "unknown log level {:?}",
                log_level
            )))
        }
    };
    Ok(level.to_string())
}

fn level_filter(log_level: &str) -> Result<EnvFilter> {
    let directive = level_directive(log_level)?;
    EnvFilter::try_new(&directive)
        .map_err(|e| WatcherError::Logging(format!("invalid log level {:?}: {}", log_level, e)))
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `log_level`. The file layer never uses ANSI colours.
pub fn init(log_dir: &Path, log_level: &str, console: bool) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let log_file = log_file_path(log_dir);
    let file = OpenOptions::new().create(true).append(true).open(&log_file)?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(log_level)?,
    };

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_writer(Mutex::new(file));

    let console_layer = console.then(|| {
        fmt::layer()
            .with_target(false)
            .with_timer(ChronoLocal::new("%H:%M:%S".to_string()))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| WatcherError::Logging(e.to_string()))?;

    Ok(log_file)
}
