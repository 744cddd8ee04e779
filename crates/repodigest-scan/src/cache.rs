//! Persistent chunk cache keyed by file fingerprint.
//!
//! The fingerprint hashes a file's canonical path and modification time,
//! so a file edited within the same mtime tick is indistinguishable from
//! the cached version. Content is never hashed.
//!
//! Each entry remembers the file it was computed from. Flushing drops
//! entries whose file is gone or has changed since, so the document does
//! not grow with every edit.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Directory under the user's home holding the default cache file.
pub const CACHE_DIR_NAME: &str = ".repodigestcache";
/// File name of the cache document.
pub const CACHE_FILE_NAME: &str = "chunks.json";

/// Errors from cache writes. Reads never fail; they miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The file to fingerprint could not be inspected.
    #[error("Cannot fingerprint {path}: {source}")]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A payload could not be serialized.
    #[error("Cannot serialize cache payload: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The cache document could not be written.
    #[error("Cannot write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A cached payload and the canonical path of the file it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    path: PathBuf,
    payload: serde_json::Value,
}

/// Map from fingerprint to serialized payload, loaded once and flushed once.
///
/// Shared by reference across workers; the map is concurrent and flushes
/// are serialized behind their own lock.
#[derive(Debug)]
pub struct ChunkCache {
    path: PathBuf,
    entries: DashMap<String, CacheEntry>,
    flush_lock: Mutex<()>,
}

impl ChunkCache {
    /// Load the cache document at `path`.
    ///
    /// A missing or unreadable file is a cold start, never an error.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = DashMap::new();

        match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, CacheEntry>>(&text) {
                Ok(map) => {
                    debug!("Loaded {} cache entries from {}", map.len(), path.display());
                    for (key, value) in map {
                        entries.insert(key, value);
                    }
                }
                Err(e) => {
                    warn!("Ignoring corrupt cache file {}: {e}", path.display());
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No cache file at {}, starting cold", path.display());
            }
            Err(e) => {
                warn!("Cannot read cache file {}: {e}", path.display());
            }
        }

        Self {
            path,
            entries,
            flush_lock: Mutex::new(()),
        }
    }

    /// Open the cache at its per-user default location.
    pub fn open_default() -> Self {
        Self::open(Self::default_path())
    }

    /// Per-user default cache file: `~/.repodigestcache/chunks.json`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .or_else(dirs::cache_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_DIR_NAME)
            .join(CACHE_FILE_NAME)
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries in memory.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached payload for the file's current fingerprint.
    ///
    /// Anything that prevents a hit (no metadata, no entry, payload of a
    /// different shape) is a miss.
    pub fn get<T: DeserializeOwned>(&self, file: &Path) -> Option<T> {
        let key = fingerprint(file).ok()?;
        let entry = self.entries.get(&key)?;
        match serde_json::from_value(entry.payload.clone()) {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!("Discarding unreadable cache entry for {}: {e}", file.display());
                None
            }
        }
    }

    /// Store a payload under the file's current fingerprint.
    pub fn set<T: Serialize>(&self, file: &Path, payload: &T) -> Result<(), CacheError> {
        let fingerprint_err = |source| CacheError::Fingerprint {
            path: file.to_path_buf(),
            source,
        };
        let path = file.canonicalize().map_err(fingerprint_err)?;
        let key = key_for(&path).map_err(fingerprint_err)?;
        let payload = serde_json::to_value(payload)?;
        self.entries.insert(key, CacheEntry { path, payload });
        Ok(())
    }

    /// Persist the whole map in one atomic replace.
    ///
    /// Entries whose file was removed or modified since they were stored
    /// are evicted first.
    pub fn flush(&self) -> Result<(), CacheError> {
        let _guard = self
            .flush_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let before = self.entries.len();
        self.entries
            .retain(|key, entry| key_for(&entry.path).is_ok_and(|current| current == *key));
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!("Evicted {evicted} stale cache entries");
        }

        let snapshot: BTreeMap<String, CacheEntry> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let text = serde_json::to_string(&snapshot)?;

        let write_err = |source| CacheError::Write {
            path: self.path.clone(),
            source,
        };
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(write_err)?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        temp.write_all(text.as_bytes()).map_err(write_err)?;
        temp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!(
            "Flushed {} cache entries to {}",
            snapshot.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Hex BLAKE3 of the file's canonical path and its mtime in nanoseconds.
pub fn fingerprint(file: &Path) -> io::Result<String> {
    key_for(&file.canonicalize()?)
}

/// Fingerprint of an already canonical path.
fn key_for(normalized: &Path) -> io::Result<String> {
    let modified = fs::metadata(normalized)?.modified()?;
    let mtime_ns = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = blake3::Hasher::new();
    hasher.update(normalized.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(mtime_ns.to_string().as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}
