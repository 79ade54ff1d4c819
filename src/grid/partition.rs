//! Geohash partitioning of the store list

use super::geohash::{self, Precision};
use crate::types::Store;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use tracing::info;

/// Literal key of the cell holding stores without coordinates
pub const UNKNOWN_CELL: &str = "unknown";

/// Cell key: a geohash, or the sentinel for unresolved stores
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CellKey {
    Geohash(String),
    Unknown,
}

impl CellKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Geohash(hash) => hash,
            Self::Unknown => UNKNOWN_CELL,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CellKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One bucket of stores
#[derive(Debug, Clone)]
pub struct GridCell {
    pub key: CellKey,
    /// Members in input order
    pub stores: Vec<Store>,
}

impl GridCell {
    pub fn count(&self) -> usize {
        self.stores.len()
    }
}

/// Stores grouped by cell, cells in creation order
#[derive(Debug, Clone)]
pub struct GridPartition {
    precision: Precision,
    cells: Vec<GridCell>,
    positions: HashMap<CellKey, usize>,
    with_coords: usize,
    without_coords: usize,
}

impl GridPartition {
    fn new(precision: Precision) -> Self {
        Self {
            precision,
            cells: Vec::new(),
            positions: HashMap::new(),
            with_coords: 0,
            without_coords: 0,
        }
    }

    fn push(&mut self, key: CellKey, store: Store) {
        let idx = match self.positions.get(&key) {
            Some(&idx) => idx,
            None => {
                self.cells.push(GridCell {
                    key: key.clone(),
                    stores: Vec::new(),
                });
                self.positions.insert(key, self.cells.len() - 1);
                self.cells.len() - 1
            }
        };
        self.cells[idx].stores.push(store);
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn get(&self, key: &CellKey) -> Option<&GridCell> {
        self.positions.get(key).map(|&idx| &self.cells[idx])
    }

    pub fn with_coords(&self) -> usize {
        self.with_coords
    }

    pub fn without_coords(&self) -> usize {
        self.without_coords
    }

    pub fn total_stores(&self) -> usize {
        self.with_coords + self.without_coords
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Assigns every store to exactly one cell
#[derive(Debug, Clone, Copy, Default)]
pub struct GeohashPartitioner {
    precision: Precision,
}

impl GeohashPartitioner {
    pub fn new(precision: Precision) -> Self {
        Self { precision }
    }

    /// Cell key for a single store
    pub fn key_for(&self, store: &Store) -> CellKey {
        match &store.coordinate {
            Some(coord) => CellKey::Geohash(geohash::encode(coord, self.precision)),
            None => CellKey::Unknown,
        }
    }

    /// Partition stores in one pass, keeping input order within each cell
    pub fn partition(&self, stores: impl IntoIterator<Item = Store>) -> GridPartition {
        info!("Partitioning stores into geohash cells (precision {})", self.precision);

        let mut partition = GridPartition::new(self.precision);
        for store in stores {
            let key = self.key_for(&store);
            if key.is_unknown() {
                partition.without_coords += 1;
            } else {
                partition.with_coords += 1;
            }
            partition.push(key, store);
        }

        info!(
            "Partition complete: {} with coordinates, {} without, {} cells",
            partition.with_coords,
            partition.without_coords,
            partition.cells.len()
        );
        partition
    }
}
