//! Name-keyed store of file records.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use stowbox_protocol::types::FileMetadata;

/// One cached file record.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub name: String,
    pub size: i64,
    pub content_hash: String,
    /// Human-readable upload time, e.g. `Tue Aug  4 10:02:17 UTC 2026`.
    pub uploaded_at: String,
}

impl FileRecord {
    /// Builds a record from wire metadata, formatting the epoch timestamp
    /// for display.
    pub fn from_wire(meta: &FileMetadata) -> Self {
        Self {
            name: meta.file_name.clone(),
            size: meta.file_size,
            content_hash: meta.content_hash.clone(),
            uploaded_at: format_upload_time(meta.uploaded_at),
        }
    }
}

/// Formats epoch seconds for display; out-of-range values format as empty.
pub(crate) fn format_upload_time(epoch_secs: i64) -> String {
    match DateTime::from_timestamp(epoch_secs, 0) {
        Some(ts) => ts.format("%a %b %e %H:%M:%S UTC %Y").to_string(),
        None => String::new(),
    }
}

/// Current time in the same display format.
pub(crate) fn format_now() -> String {
    Utc::now().format("%a %b %e %H:%M:%S UTC %Y").to_string()
}

/// Mapping from file name to record, safe to touch from the transfer
/// engine and the reconciler concurrently.
#[derive(Debug, Default)]
pub struct MetadataCache {
    records: RwLock<HashMap<String, FileRecord>>,
}

impl MetadataCache {
    /// Inserts or overwrites the record under its name.
    pub fn save(&self, record: FileRecord) {
        self.records
            .write()
            .unwrap()
            .insert(record.name.clone(), record);
    }

    /// Returns the record for `name`, or `None` if unknown.
    pub fn get(&self, name: &str) -> Option<FileRecord> {
        self.records.read().unwrap().get(name).cloned()
    }

    /// Removes the record for `name`. Returns `false` if it was not cached.
    pub fn delete(&self, name: &str) -> bool {
        self.records.write().unwrap().remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().unwrap().is_empty()
    }

    /// All cached file names.
    pub fn file_names(&self) -> Vec<String> {
        self.records.read().unwrap().keys().cloned().collect()
    }
}
