//! Core types and collaborator traits for the directory backup watcher.
//!
//! This crate defines the vocabulary shared by the watcher process and the
//! admin tooling:
//! - `WatchEvent`: a raw filesystem notification
//! - `BackupAttempt` / `AttemptRecord`: the outcome of one backup and its structured form
//! - `ObjectStore`: the object-store collaborator (bootstrap, upload, download, listing)
//! - `VersionedKey`: the `{base}_{YYYYMMDD_HHMMSS}{ext}` naming scheme
//! - `RestoreCoordinator`: the temp-file-then-rename restore protocol

mod attempt;
mod error;
mod event;
mod format;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
mod naming;
mod restore;
mod store;

pub use attempt::{AttemptRecord, AttemptStatus, BackupAttempt};
pub use error::{RestoreError, StoreError};
pub use event::{EventKind, WatchEvent};
pub use format::{format_duration, format_size};
pub use naming::{group_versions, original_file_name, VersionedKey};
pub use restore::{
    is_restore_temp, restore_temp_path, RestoreCoordinator, RestoredFile, RESTORE_TEMP_SUFFIX,
};
pub use store::{BucketStatus, ObjectStore, ObjectVersion, UploadReceipt};
