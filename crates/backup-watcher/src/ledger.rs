//! Backup Ledger: append-only record of attempts plus running counters.

use std::sync::Mutex;

use backup_core::{format_size, AttemptRecord, BackupAttempt};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Running totals. Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCounters {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Bytes of successfully backed-up files
    pub total_bytes: u64,
}

/// Point-in-time statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_bytes: u64,
    /// Percentage of successful attempts, 2 decimals; 0 with no attempts
    pub success_rate: f64,
    pub total_bytes_formatted: String,
}

impl LedgerSnapshot {
    fn from_counters(counters: &LedgerCounters) -> Self {
        Self {
            total: counters.total,
            successful: counters.successful,
            failed: counters.failed,
            total_bytes: counters.total_bytes,
            success_rate: success_rate(counters.successful, counters.total),
            total_bytes_formatted: format_size(counters.total_bytes),
        }
    }

    /// Log the statistics block.
    pub fn log(&self) {
        let rule = "=".repeat(50);
        info!("{}", rule);
        info!("BACKUP STATISTICS");
        info!("{}", rule);
        info!("Total backups: {}", self.total);
        info!("Successful: {}", self.successful);
        info!("Failed: {}", self.failed);
        info!("Success rate: {}%", format_rate(self.success_rate));
        info!("Total size backed up: {}", self.total_bytes_formatted);
        info!("{}", rule);
    }
}

/// Statistics plus every recorded attempt, for JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerExport {
    pub stats: LedgerSnapshot,
    pub attempts: Vec<AttemptRecord>,
}

/// `successful / total * 100` rounded to 2 decimals, 0 when nothing was attempted.
pub fn success_rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = successful as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// Render a rate with at least one decimal: `100.0`, `50.0`, `66.67`.
pub fn format_rate(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{:.1}", rate)
    } else {
        rate.to_string()
    }
}

#[derive(Debug, Default)]
struct LedgerInner {
    attempts: Vec<BackupAttempt>,
    counters: LedgerCounters,
}

/// Append-only attempt ledger. The attempt list and the counters change together
/// under one lock, so readers never observe one without the other.
#[derive(Debug, Default)]
pub struct Ledger {
    inner: Mutex<LedgerInner>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt and update the counters atomically.
    pub fn record(&self, attempt: BackupAttempt) {
        let mut inner = self.inner.lock().expect("ledger poisoned");
        inner.counters.total += 1;
        if attempt.is_success() {
            inner.counters.successful += 1;
            inner.counters.total_bytes += attempt.size_bytes.unwrap_or(0);
        } else {
            inner.counters.failed += 1;
        }
        inner.attempts.push(attempt);
    }

    pub fn counters(&self) -> LedgerCounters {
        self.inner.lock().expect("ledger poisoned").counters
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let inner = self.inner.lock().expect("ledger poisoned");
        LedgerSnapshot::from_counters(&inner.counters)
    }

    /// Copy of every recorded attempt, oldest first.
    pub fn attempts(&self) -> Vec<BackupAttempt> {
        self.inner.lock().expect("ledger poisoned").attempts.clone()
    }

    pub fn export(&self) -> LedgerExport {
        let inner = self.inner.lock().expect("ledger poisoned");
        LedgerExport {
            stats: LedgerSnapshot::from_counters(&inner.counters),
            attempts: inner.attempts.iter().map(BackupAttempt::to_record).collect(),
        }
    }

    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.export())
    }
}
