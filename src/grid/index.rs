//! Grid index manifest
//!
//! One summary per cell, largest cells first, plus dataset-wide counts. The
//! front-end reads this file to decide which cell files to fetch for the
//! visible map area.

use super::geohash::{self, Bounds, GeohashError, Precision};
use super::partition::{CellKey, GridPartition};
use crate::types::{Coordinate, DATA_VERSION};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

/// Manifest entry for one cell
#[derive(Debug, Clone, Serialize)]
pub struct GridSummary {
    pub geohash: CellKey,
    pub count: usize,
    /// Absent for the sentinel cell
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<Coordinate>,
    /// `null` for the sentinel cell
    pub bounds: Option<Bounds>,
}

impl GridSummary {
    fn for_cell(key: &CellKey, count: usize) -> Result<Self, GeohashError> {
        let (center, bounds) = match key {
            CellKey::Geohash(hash) => {
                let cell = geohash::decode(hash)?;
                (Some(cell.center()), Some(cell.bounds()))
            }
            CellKey::Unknown => (None, None),
        };
        Ok(Self {
            geohash: key.clone(),
            count,
            center,
            bounds,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub with_coords: usize,
    pub without_coords: usize,
}

/// The manifest document
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridIndex {
    pub version: String,
    pub last_updated: DateTime<Utc>,
    pub precision: Precision,
    pub total_stores: usize,
    pub total_grids: usize,
    pub grids: Vec<GridSummary>,
    pub stats: IndexStats,
}

impl GridIndex {
    /// Summarize a partition. Cells are ordered by count, descending, then key ascending.
    pub fn build(partition: &GridPartition) -> Result<Self, GeohashError> {
        let mut grids = partition
            .cells()
            .iter()
            .map(|cell| GridSummary::for_cell(&cell.key, cell.count()))
            .collect::<Result<Vec<_>, _>>()?;

        grids.sort_by(compare_summaries);

        Ok(Self {
            version: DATA_VERSION.to_string(),
            last_updated: Utc::now(),
            precision: partition.precision(),
            total_stores: partition.total_stores(),
            total_grids: grids.len(),
            grids,
            stats: IndexStats {
                with_coords: partition.with_coords(),
                without_coords: partition.without_coords(),
            },
        })
    }
}

fn compare_summaries(a: &GridSummary, b: &GridSummary) -> Ordering {
    b.count
        .cmp(&a.count)
        .then_with(|| a.geohash.as_str().cmp(b.geohash.as_str()))
}
