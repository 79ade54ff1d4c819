//! geogrid: merchant registry geocoding and geohash grid partitioning
//!
//! An offline batch pipeline that turns a merchant registry into static map data:
//! - CSV merchant table input with voucher-type and category classification
//! - Remote geocoding behind a persistent cache, retry/backoff and a call throttle
//! - A checkpointed batch runner that resumes after interruption
//! - Geohash partitioning into per-cell files plus a sorted grid index manifest

pub mod batch;
pub mod config;
pub mod geocode;
pub mod grid;
pub mod source;
pub mod types;
pub mod util;

pub use config::Config;
pub use types::*;
