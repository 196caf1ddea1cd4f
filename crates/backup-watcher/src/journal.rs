//! Daily JSON journal of structured attempt records.
//!
//! Layout:
//! ```text
//! {log_dir}/
//!   backup_{YYYYMMDD}.json    # pretty-printed array of attempt records
//! ```

use std::path::{Path, PathBuf};

use backup_core::AttemptRecord;
use chrono::Local;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, WatcherError};

#[derive(Debug)]
pub struct AttemptJournal {
    log_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl AttemptJournal {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Journal file for the current local day.
    pub fn current_path(&self) -> PathBuf {
        self.log_dir
            .join(format!("backup_{}.json", Local::now().format("%Y%m%d")))
    }

    /// Append one record to today's journal.
    pub async fn append(&self, record: &AttemptRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.current_path();

        let mut records = read_records(&path).await?;
        records.push(serde_json::to_value(record)?);

        fs::create_dir_all(&self.log_dir).await?;
        fs::write(&path, serde_json::to_vec_pretty(&records)?).await?;
        debug!("Appended attempt record to {}", path.display());
        Ok(())
    }

    /// Every record in today's journal.
    pub async fn read_today(&self) -> Result<Vec<AttemptRecord>> {
        let _guard = self.write_lock.lock().await;
        let values = read_records(&self.current_path()).await?;
        values
            .into_iter()
            .map(|v| serde_json::from_value::<AttemptRecord>(v).map_err(WatcherError::from))
            .collect()
    }
}

async fn read_records(path: &Path) -> Result<Vec<serde_json::Value>> {
    match fs::read(path).await {
        Ok(data) => Ok(serde_json::from_slice(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}
