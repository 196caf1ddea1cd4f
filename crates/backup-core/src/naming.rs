use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::StoreError;
use crate::store::ObjectVersion;

/// Timestamp layout embedded in versioned keys.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
/// Length of `_YYYYMMDD_HHMMSS`.
const TIMESTAMP_SUFFIX_LEN: usize = 16;

/// Object key of one backed-up version: `{base}_{YYYYMMDD_HHMMSS}{extension}`.
///
/// The extension keeps its leading dot and is split off the way most tools do:
/// the last dot wins, and leading dots (hidden files) never start an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedKey {
    pub base: String,
    pub extension: String,
    pub timestamp: NaiveDateTime,
}

impl VersionedKey {
    /// Build the key for a file name backed up at `at`.
    pub fn for_file_name(file_name: &str, at: NaiveDateTime) -> Self {
        let (base, extension) = split_extension(file_name);
        Self {
            base: base.to_string(),
            extension: extension.to_string(),
            timestamp: at,
        }
    }

    /// Build the key for a local path backed up at `at`.
    pub fn for_path(path: &Path, at: NaiveDateTime) -> Result<Self, StoreError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                StoreError::InvalidPath(format!(
                    "{} has no UTF-8 file name",
                    path.display()
                ))
            })?;
        Ok(Self::for_file_name(file_name, at))
    }

    /// Parse an object key produced by [`VersionedKey::for_file_name`].
    /// Returns `None` for keys that do not carry a timestamp.
    pub fn parse(key: &str) -> Option<Self> {
        let name = key.rsplit('/').next().unwrap_or(key);
        let (stem, extension) = split_extension(name);
        if stem.len() <= TIMESTAMP_SUFFIX_LEN {
            return None;
        }
        let split = stem.len() - TIMESTAMP_SUFFIX_LEN;
        if !stem.is_char_boundary(split) {
            return None;
        }
        let (base, suffix) = stem.split_at(split);
        let raw = suffix.strip_prefix('_')?;
        let timestamp = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            base: base.to_string(),
            extension: extension.to_string(),
            timestamp,
        })
    }

    /// The file name this version was taken from.
    pub fn original_name(&self) -> String {
        format!("{}{}", self.base, self.extension)
    }
}

impl fmt::Display for VersionedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}{}",
            self.base,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.extension
        )
    }
}

/// Original file name for an object key; unversioned keys map to their last path component.
pub fn original_file_name(key: &str) -> String {
    VersionedKey::parse(key)
        .map(|v| v.original_name())
        .unwrap_or_else(|| key.rsplit('/').next().unwrap_or(key).to_string())
}

/// Group stored objects by the file they were taken from, oldest version first.
pub fn group_versions(versions: Vec<ObjectVersion>) -> BTreeMap<String, Vec<ObjectVersion>> {
    let mut grouped: BTreeMap<String, Vec<ObjectVersion>> = BTreeMap::new();
    for version in versions {
        grouped
            .entry(original_file_name(&version.key))
            .or_default()
            .push(version);
    }
    // The timestamp precedes the extension, so key order is chronological within a group.
    for group in grouped.values_mut() {
        group.sort_by(|a, b| a.key.cmp(&b.key));
    }
    grouped
}

fn split_extension(file_name: &str) -> (&str, &str) {
    let leading_dots = file_name.len() - file_name.trim_start_matches('.').len();
    match file_name[leading_dots..].rfind('.') {
        Some(i) => file_name.split_at(leading_dots + i),
        None => (file_name, ""),
    }
}
