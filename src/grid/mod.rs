//! Geohash grid partitioning
//!
//! Splits a geocoded dataset into one file per geohash cell plus a manifest
//! (`grid_index.json`) the map front-end uses to find cells.
//!
//! | precision | cell size (approx.) |
//! |-----------|---------------------|
//! | 4         | 39 km × 19.5 km     |
//! | 5         | 4.9 km × 4.9 km     |
//! | 6         | 1.2 km × 0.61 km    |
//!
//! Stores without coordinates land in a sentinel cell named `unknown`.

pub mod geohash;
pub mod index;
pub mod partition;
pub mod writer;

pub use geohash::{Bounds, GeohashError, Precision};
pub use index::{GridIndex, GridSummary, IndexStats};
pub use partition::{CellKey, GeohashPartitioner, GridCell, GridPartition, UNKNOWN_CELL};
pub use writer::{load_dataset, GridError, GridWriter, WriteReport};
