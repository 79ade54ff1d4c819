//! Checkpoint and grid output configuration

use crate::batch::RunnerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Batch durability settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub checkpoint_path: PathBuf,
    /// Partial result set, also the input of the grid stage
    pub results_path: PathBuf,
    /// Save after this many records
    pub batch_size: usize,
    /// ...or after this many seconds, whichever comes first
    pub save_interval_secs: u64,
    /// Log progress every this many records
    pub progress_interval: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: PathBuf::from("data/.checkpoint.json"),
            results_path: PathBuf::from("data/.geocoded_partial.json"),
            batch_size: 1000,
            save_interval_secs: 300,
            progress_interval: 100,
        }
    }
}

impl CheckpointConfig {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            batch_size: self.batch_size,
            save_interval: Duration::from_secs(self.save_interval_secs),
            progress_interval: self.progress_interval,
            ..RunnerConfig::default()
        }
    }
}

/// Grid partitioning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Geohash length, 1..=12
    pub precision: u8,
    /// One JSON file per cell is written here
    pub output_dir: PathBuf,
    pub index_path: PathBuf,
    /// Copies of the full dataset
    pub backup_paths: Vec<PathBuf>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            precision: 5,
            output_dir: PathBuf::from("docs/data/grid"),
            index_path: PathBuf::from("docs/data/grid_index.json"),
            backup_paths: vec![
                PathBuf::from("data/stores_with_coords.json"),
                PathBuf::from("docs/data/stores_with_coords.json"),
            ],
        }
    }
}
