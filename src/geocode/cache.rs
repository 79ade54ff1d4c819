//! Persistent lookup cache
//!
//! Maps a query's cache key to the provider's answer, including confirmed
//! misses (stored as JSON `null`). Entries are only ever added: once a key is
//! present it is never overwritten or removed, so a query reaches the network
//! at most once across runs that share the cache file.

use super::provider::Place;
use crate::util::write_json_atomic;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to write cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Cached answer for one query: `Some(place)` for a hit, `None` for a confirmed miss
pub type CachedAnswer = Option<Place>;

/// Key → answer map, loaded fully at startup and rewritten fully on save
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: BTreeMap<String, CachedAnswer>,
    path: Option<PathBuf>,
    dirty: bool,
}

impl GeocodeCache {
    /// In-memory cache with no backing file
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file at `path`.
    ///
    /// A missing or unreadable file yields an empty cache; unreadable files are
    /// logged and will be overwritten on the next save.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries: BTreeMap<String, CachedAnswer> = if path.exists() {
            match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()))
            {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Failed to load geocode cache {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        if !entries.is_empty() {
            info!("Loaded geocode cache: {} entries from {}", entries.len(), path.display());
        }

        Self {
            entries,
            path: Some(path),
            dirty: false,
        }
    }

    /// Look up a key; the outer `Option` is "known?", the inner is "hit?"
    pub fn get(&self, key: &str) -> Option<&CachedAnswer> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Record an answer. Returns `false` (and changes nothing) if the key is already known.
    pub fn insert(&mut self, key: impl Into<String>, answer: CachedAnswer) -> bool {
        match self.entries.entry(key.into()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(answer);
                self.dirty = true;
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of cached misses
    pub fn miss_count(&self) -> usize {
        self.entries.values().filter(|v| v.is_none()).count()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Rewrite the backing file if anything changed since the last save
    pub fn save(&mut self) -> Result<(), CacheError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        if !self.dirty {
            return Ok(());
        }

        write_json_atomic(path, &self.entries).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;
        self.dirty = false;
        info!("Saved geocode cache: {} entries", self.entries.len());
        Ok(())
    }
}
