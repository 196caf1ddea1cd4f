use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::format::format_size;
use crate::store::UploadReceipt;

/// Terminal status of one backup attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttemptStatus {
    Success,
    Failed,
}

/// Outcome of one Backup Pipeline invocation. Never mutated once built.
#[derive(Debug, Clone)]
pub struct BackupAttempt {
    pub path: PathBuf,
    /// Versioned object key, set on success
    pub destination_key: Option<String>,
    /// Full destination URI (`s3://bucket/key`), set on success
    pub destination: Option<String>,
    /// File size, when it could be read
    pub size_bytes: Option<u64>,
    pub duration: Duration,
    pub status: AttemptStatus,
    pub error: Option<String>,
    pub timestamp: DateTime<Local>,
}

impl BackupAttempt {
    pub fn succeeded(
        path: impl Into<PathBuf>,
        receipt: UploadReceipt,
        size_bytes: u64,
        duration: Duration,
    ) -> Self {
        Self {
            path: path.into(),
            destination_key: Some(receipt.key),
            destination: Some(receipt.destination),
            size_bytes: Some(size_bytes),
            duration,
            status: AttemptStatus::Success,
            error: None,
            timestamp: Local::now(),
        }
    }

    pub fn failed(
        path: impl Into<PathBuf>,
        error: impl Into<String>,
        size_bytes: Option<u64>,
        duration: Duration,
    ) -> Self {
        Self {
            path: path.into(),
            destination_key: None,
            destination: None,
            size_bytes,
            duration,
            status: AttemptStatus::Failed,
            error: Some(error.into()),
            timestamp: Local::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AttemptStatus::Success
    }

    /// Duration in seconds, rounded to 2 decimals.
    pub fn duration_seconds(&self) -> f64 {
        (self.duration.as_secs_f64() * 100.0).round() / 100.0
    }

    /// Structured form consumed by log/metrics sinks.
    pub fn to_record(&self) -> AttemptRecord {
        let success = self.is_success();
        AttemptRecord {
            timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, false),
            status: self.status,
            source: self.path.display().to_string(),
            destination: self.destination.clone(),
            size_bytes: self.size_bytes,
            size_formatted: self.size_bytes.map(format_size),
            duration_seconds: success.then(|| self.duration_seconds()),
            error: self.error.clone(),
        }
    }
}

/// Structured attempt record, one JSON object per attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// ISO-8601 local timestamp
    pub timestamp: String,
    pub status: AttemptStatus,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> UploadReceipt {
        UploadReceipt {
            key: "notes_20251214_133045.txt".to_string(),
            destination: "s3://bucket/notes_20251214_133045.txt".to_string(),
        }
    }

    #[test]
    fn test_success_record_fields() {
        let attempt = BackupAttempt::succeeded(
            "/src/notes.txt",
            receipt(),
            1536,
            Duration::from_millis(1234),
        );
        let record = attempt.to_record();

        assert_eq!(record.status, AttemptStatus::Success);
        assert_eq!(record.source, "/src/notes.txt");
        assert_eq!(
            record.destination.as_deref(),
            Some("s3://bucket/notes_20251214_133045.txt")
        );
        assert_eq!(record.size_bytes, Some(1536));
        assert_eq!(record.size_formatted.as_deref(), Some("1.50 KB"));
        assert_eq!(record.duration_seconds, Some(1.23));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_failed_record_omits_absent_fields() {
        let attempt = BackupAttempt::failed(
            "/src/d.txt",
            "connection refused",
            None,
            Duration::from_millis(10),
        );
        let json = serde_json::to_value(attempt.to_record()).unwrap();

        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["source"], "/src/d.txt");
        assert_eq!(json["error"], "connection refused");
        assert!(json.get("destination").is_none());
        assert!(json.get("size_bytes").is_none());
        assert!(json.get("duration_seconds").is_none());
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
