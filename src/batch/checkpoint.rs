//! Checkpoint and partial-result persistence

use crate::geocode::CacheError;
use crate::source::InputFingerprint;
use crate::types::{Store, DATA_VERSION};
use crate::util::write_json_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors that terminate a batch run
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to write checkpoint {path}: {source}")]
    CheckpointWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write partial results {path}: {source}")]
    ResultsWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Running counters for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Records in the input
    pub total: u64,
    /// Records sent to the resolver
    pub processed: u64,
    /// Processed records that got a coordinate
    pub resolved: u64,
    /// Processed records that did not
    pub failed: u64,
    /// Processed records answered entirely from the cache
    pub cached: u64,
    /// Records skipped for missing name or location
    pub skipped: u64,
}

impl BatchStats {
    /// Records consumed so far, skipped ones included
    pub fn completed(&self) -> u64 {
        self.processed + self.skipped
    }

    /// Share of processed records that resolved, in percent
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.resolved as f64 / self.processed as f64 * 100.0
        }
    }
}

/// Durable marker of the last completed record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Index of the last fully processed record
    pub last_index: usize,
    pub stats: BatchStats,
    pub timestamp: DateTime<Utc>,
    /// Identity of the input this checkpoint belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputFingerprint>,
}

impl Checkpoint {
    pub fn new(last_index: usize, stats: BatchStats, input: Option<InputFingerprint>) -> Self {
        Self {
            last_index,
            stats,
            timestamp: Utc::now(),
            input,
        }
    }

    /// Load a checkpoint file; `None` if absent or unreadable
    pub fn load(path: &Path) -> Option<Self> {
        read_json(path, "checkpoint")
    }
}

/// Accumulated output records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialResults {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub total_stores: usize,
    pub stores: Vec<Store>,
}

impl PartialResults {
    pub fn new(stores: Vec<Store>) -> Self {
        Self {
            version: DATA_VERSION.to_string(),
            last_updated: Utc::now(),
            total_stores: stores.len(),
            stores,
        }
    }

    /// Load a results file; `None` if absent or unreadable
    pub fn load(path: &Path) -> Option<Self> {
        read_json(path, "partial results")
    }
}

/// Borrowed view used when saving, so the runner never clones its result list
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PartialResultsRef<'a> {
    version: &'static str,
    last_updated: DateTime<Utc>,
    total_stores: usize,
    stores: &'a [Store],
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|json| serde_json::from_str(&json).map_err(|e| e.to_string()));
    match parsed {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring unreadable {} {}: {}", what, path.display(), e);
            None
        }
    }
}

/// Where a run picks up
#[derive(Debug, Clone)]
pub struct ResumeState {
    /// First record index still to process
    pub next_index: usize,
    pub stats: BatchStats,
    pub results: Vec<Store>,
}

/// Paired checkpoint + partial-results files
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    checkpoint_path: PathBuf,
    results_path: PathBuf,
}

impl CheckpointStore {
    pub fn new(checkpoint_path: impl Into<PathBuf>, results_path: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_path: checkpoint_path.into(),
            results_path: results_path.into(),
        }
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    /// Load the resume point for `input`.
    ///
    /// Returns `None` (fresh start) when either file is missing or unreadable,
    /// when the checkpoint was written for a different input, or when the two
    /// files disagree. Results written ahead of their checkpoint are truncated
    /// back to the checkpointed count.
    pub fn load_resume(&self, input: &InputFingerprint) -> Option<ResumeState> {
        let checkpoint = Checkpoint::load(&self.checkpoint_path)?;

        if checkpoint.input.as_ref() != Some(input) {
            warn!(
                "Checkpoint {} was written for a different input; starting fresh",
                self.checkpoint_path.display()
            );
            return None;
        }
        if checkpoint.last_index >= input.records {
            warn!(
                "Checkpoint index {} is beyond the input ({} records); starting fresh",
                checkpoint.last_index, input.records
            );
            return None;
        }
        if checkpoint.stats.completed() != checkpoint.last_index as u64 + 1 {
            warn!(
                "Checkpoint stats ({} completed) disagree with index {}; starting fresh",
                checkpoint.stats.completed(),
                checkpoint.last_index
            );
            return None;
        }

        let Some(partial) = PartialResults::load(&self.results_path) else {
            warn!(
                "Checkpoint found but partial results {} are missing; starting fresh",
                self.results_path.display()
            );
            return None;
        };

        let mut results = partial.stores;
        let expected = checkpoint.stats.processed as usize;
        if results.len() < expected {
            warn!(
                "Partial results hold {} stores, checkpoint expects {}; starting fresh",
                results.len(),
                expected
            );
            return None;
        }
        if results.len() > expected {
            warn!(
                "Dropping {} stores written after the last checkpoint",
                results.len() - expected
            );
            results.truncate(expected);
        }

        info!(
            "Resuming from checkpoint: record {} of {}, {} stores loaded",
            checkpoint.last_index + 1,
            input.records,
            results.len()
        );

        Some(ResumeState {
            next_index: checkpoint.last_index + 1,
            stats: checkpoint.stats,
            results,
        })
    }

    /// Persist results, then the checkpoint that covers them
    pub fn save(&self, checkpoint: &Checkpoint, stores: &[Store]) -> Result<(), BatchError> {
        let partial = PartialResultsRef {
            version: DATA_VERSION,
            last_updated: checkpoint.timestamp,
            total_stores: stores.len(),
            stores,
        };
        write_json_atomic(&self.results_path, &partial).map_err(|source| {
            BatchError::ResultsWrite {
                path: self.results_path.clone(),
                source,
            }
        })?;

        write_json_atomic(&self.checkpoint_path, checkpoint).map_err(|source| {
            BatchError::CheckpointWrite {
                path: self.checkpoint_path.clone(),
                source,
            }
        })?;

        info!(
            "Checkpoint saved: index {}, {} stores",
            checkpoint.last_index,
            stores.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;
    use tempfile::TempDir;

    fn stores(n: usize) -> Vec<Store> {
        (0..n)
            .map(|i| {
                Store::builder(i as u64 + 1, format!("store-{}", i), "Seoul")
                    .coordinate(Coordinate::new(37.5, 127.0))
                    .build()
            })
            .collect()
    }

    fn fingerprint(records: usize) -> InputFingerprint {
        InputFingerprint::compute(b"fixture", records)
    }

    fn stats(processed: u64, skipped: u64) -> BatchStats {
        BatchStats {
            total: 10,
            processed,
            resolved: processed,
            skipped,
            ..Default::default()
        }
    }

    fn store_in(dir: &TempDir) -> CheckpointStore {
        CheckpointStore::new(
            dir.path().join("data/.checkpoint.json"),
            dir.path().join("data/.geocoded_partial.json"),
        )
    }

    #[test]
    fn test_save_and_resume() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);

        let checkpoint = Checkpoint::new(4, stats(4, 1), Some(fingerprint(10)));
        store.save(&checkpoint, &stores(4)).unwrap();

        let resume = store.load_resume(&fingerprint(10)).unwrap();
        assert_eq!(resume.next_index, 5);
        assert_eq!(resume.results.len(), 4);
        assert_eq!(resume.stats.skipped, 1);

        let raw: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(store.results_path()).unwrap(),
        )
        .unwrap();
        assert_eq!(raw["version"], "2.0.0");
        assert_eq!(raw["totalStores"], 4);
        assert!(raw["lastUpdated"].is_string());
    }

    #[test]
    fn test_missing_files_mean_fresh_start() {
        let temp_dir = TempDir::new().unwrap();
        assert!(store_in(&temp_dir).load_resume(&fingerprint(10)).is_none());
    }

    #[test]
    fn test_fingerprint_mismatch_is_fresh_start() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        store
            .save(&Checkpoint::new(1, stats(2, 0), Some(fingerprint(10))), &stores(2))
            .unwrap();

        let other = InputFingerprint::compute(b"different", 10);
        assert!(store.load_resume(&other).is_none());
    }

    #[test]
    fn test_index_beyond_input_is_fresh_start() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let input = fingerprint(3);
        store
            .save(&Checkpoint::new(5, stats(6, 0), Some(input.clone())), &stores(6))
            .unwrap();

        assert!(store.load_resume(&input).is_none());
    }

    #[test]
    fn test_results_ahead_of_checkpoint_are_truncated() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        let input = fingerprint(10);
        store
            .save(&Checkpoint::new(2, stats(3, 0), Some(input.clone())), &stores(5))
            .unwrap();

        let resume = store.load_resume(&input).unwrap();
        assert_eq!(resume.results.len(), 3);
        assert_eq!(resume.results.last().unwrap().id, 3);
    }

    #[test]
    fn test_corrupt_checkpoint_is_fresh_start() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_in(&temp_dir);
        std::fs::create_dir_all(temp_dir.path().join("data")).unwrap();
        std::fs::write(store.checkpoint_path(), "{\"last_index\": ").unwrap();

        assert!(store.load_resume(&fingerprint(10)).is_none());
    }

    #[test]
    fn test_success_rate() {
        let stats = BatchStats {
            processed: 4,
            resolved: 3,
            ..Default::default()
        };
        assert!((stats.success_rate() - 75.0).abs() < 1e-9);
        assert_eq!(BatchStats::default().success_rate(), 0.0);
    }
}
