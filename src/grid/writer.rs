//! Grid output files

use super::geohash::GeohashError;
use super::index::GridIndex;
use super::partition::{CellKey, GridPartition};
use crate::batch::PartialResults;
use crate::types::Store;
use crate::util::write_json_atomic;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Cells larger than this get their own log line
const LARGE_CELL_LOG_THRESHOLD: usize = 100;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Geohash(#[from] GeohashError),
}

/// Per-cell file body
#[derive(Serialize)]
struct CellFile<'a> {
    geohash: &'a CellKey,
    count: usize,
    stores: &'a [Store],
}

/// What was written
#[derive(Debug, Clone, Default)]
pub struct WriteReport {
    pub cell_files: usize,
    pub cell_bytes: u64,
    pub index_bytes: u64,
    pub backups: Vec<PathBuf>,
}

/// Read a geocoded dataset (partial-results document)
pub fn load_dataset(path: &Path) -> Result<PartialResults, GridError> {
    let json = std::fs::read_to_string(path).map_err(|source| GridError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset: PartialResults = serde_json::from_str(&json).map_err(|source| GridError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded {} stores from {}", dataset.stores.len(), path.display());
    Ok(dataset)
}

/// Writes cell files, the manifest and dataset backups
#[derive(Debug, Clone)]
pub struct GridWriter {
    output_dir: PathBuf,
    index_path: PathBuf,
    backup_paths: Vec<PathBuf>,
}

impl GridWriter {
    pub fn new(output_dir: impl Into<PathBuf>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            index_path: index_path.into(),
            backup_paths: Vec::new(),
        }
    }

    pub fn with_backups(mut self, paths: Vec<PathBuf>) -> Self {
        self.backup_paths = paths;
        self
    }

    /// Path of the file for `key`
    pub fn cell_path(&self, key: &CellKey) -> PathBuf {
        self.output_dir.join(format!("{}.json", key))
    }

    /// Write one file per cell, then the manifest, then the backups
    pub fn write(
        &self,
        partition: &GridPartition,
        index: &GridIndex,
        dataset: &PartialResults,
    ) -> Result<WriteReport, GridError> {
        let mut report = WriteReport::default();

        for cell in partition.cells() {
            let path = self.cell_path(&cell.key);
            let body = CellFile {
                geohash: &cell.key,
                count: cell.count(),
                stores: &cell.stores,
            };
            let bytes = write_json_atomic(&path, &body).map_err(|source| GridError::Write {
                path: path.clone(),
                source,
            })?;

            if cell.count() > LARGE_CELL_LOG_THRESHOLD {
                info!("  {}.json: {} stores, {:.1} KB", cell.key, cell.count(), bytes as f64 / 1024.0);
            }
            report.cell_files += 1;
            report.cell_bytes += bytes;
        }
        info!(
            "Wrote {} cell files to {} ({:.2} MB)",
            report.cell_files,
            self.output_dir.display(),
            report.cell_bytes as f64 / (1024.0 * 1024.0)
        );

        report.index_bytes = write_json_atomic(&self.index_path, index).map_err(|source| {
            GridError::Write {
                path: self.index_path.clone(),
                source,
            }
        })?;
        info!(
            "Wrote grid index {} ({:.1} KB)",
            self.index_path.display(),
            report.index_bytes as f64 / 1024.0
        );

        for path in &self.backup_paths {
            write_json_atomic(path, dataset).map_err(|source| GridError::Write {
                path: path.clone(),
                source,
            })?;
            report.backups.push(path.clone());
        }
        if !report.backups.is_empty() {
            info!("Wrote {} dataset backups", report.backups.len());
        }

        Ok(report)
    }
}
