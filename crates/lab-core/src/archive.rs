//! Session archive of past digitizations
//!
//! Keeps the most recent scans, newest first, and persists them to a
//! key-value store after every change. A store that is missing or holds
//! garbage yields an empty archive; write failures are logged and dropped.

use crate::error::{Error, Result};
use crate::table::Table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Store key under which the archive is persisted
pub const ARCHIVE_KEY: &str = "labdigitizer_history_v3";

/// Maximum number of entries kept
pub const ARCHIVE_CAPACITY: usize = 20;

/// One archived digitization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    /// Unique ID (creation time in milliseconds, as text)
    pub id: String,
    /// When the scan was digitized
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Snapshot of the digitized table
    #[serde(rename = "data")]
    pub table: Table,
    /// Source image as a data URI
    pub image: String,
    /// Free-text label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ScanEntry {
    /// Create an entry stamped with `timestamp`; the ID derives from it
    pub fn new(table: Table, image: impl Into<String>, tag: Option<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: timestamp.timestamp_millis().to_string(),
            timestamp,
            table,
            image: image.into(),
            tag,
        }
    }

    /// Short display title: first header, or "Unlabeled"
    pub fn title(&self) -> String {
        let first = self
            .table
            .headers
            .first()
            .filter(|h| !h.is_empty())
            .map(String::as_str)
            .unwrap_or("Unlabeled");
        format!("{} Project", first)
    }
}

/// Byte store the archive persists into
pub trait ArchiveStore {
    /// Read the value under `key`, `None` if nothing was stored yet
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the value under `key`
    fn write(&mut self, key: &str, value: &[u8]) -> Result<()>;
}

/// Store keeping one `<key>.json` file per key in a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl ArchiveStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        fs::read(&path)
            .map(Some)
            .map_err(|e| Error::FileRead { path, source: e })
    }

    fn write(&mut self, key: &str, value: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|e| Error::FileWrite { path, source: e })
    }
}

/// In-process store, for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArchiveStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Bounded, newest-first list of past scans backed by a store
#[derive(Debug)]
pub struct SessionArchive<S: ArchiveStore> {
    store: S,
    entries: Vec<ScanEntry>,
}

impl<S: ArchiveStore> SessionArchive<S> {
    /// Load the archive from `store`.
    ///
    /// Never fails: unreadable or corrupt data is logged and replaced by an
    /// empty archive.
    pub fn open(store: S) -> Self {
        let entries = match store.read(ARCHIVE_KEY) {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<ScanEntry>>(&bytes) {
                Ok(mut entries) => {
                    entries.truncate(ARCHIVE_CAPACITY);
                    debug!("loaded {} archived scans", entries.len());
                    entries
                }
                Err(e) => {
                    warn!("archive is corrupt, starting empty: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("archive could not be read, starting empty: {}", e);
                Vec::new()
            }
        };

        Self { store, entries }
    }

    /// Entries, newest first
    pub fn list(&self) -> &[ScanEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is archived
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by ID
    pub fn find(&self, id: &str) -> Option<&ScanEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// The newest entry
    pub fn latest(&self) -> Option<&ScanEntry> {
        self.entries.first()
    }

    /// Prepend an entry, drop anything past the capacity, then persist.
    ///
    /// Persisting is best-effort: a failed write is logged and the in-memory
    /// archive keeps the new entry.
    ///
    /// IDs stay unique: an entry whose ID is already taken gets a numeric
    /// suffix.
    pub fn record(&mut self, mut entry: ScanEntry) {
        let base = entry.id.clone();
        let mut n = 1;
        while self.find(&entry.id).is_some() {
            entry.id = format!("{}-{}", base, n);
            n += 1;
        }

        self.entries.insert(0, entry);
        self.entries.truncate(ARCHIVE_CAPACITY);

        if let Err(e) = self.persist() {
            warn!("failed to persist archive: {}", e);
        }
    }

    /// Copy out the table and image of the entry with this ID
    pub fn load(&self, id: &str) -> Result<(Table, String)> {
        self.find(id)
            .map(|e| (e.table.clone(), e.image.clone()))
            .ok_or_else(|| Error::EntryNotFound(id.to_string()))
    }

    /// Access the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&mut self) -> Result<()> {
        let bytes = serde_json::to_vec(&self.entries)?;
        self.store.write(ARCHIVE_KEY, &bytes)
    }
}
