//! Resumable batch geocoding
//!
//! Drives the [`AddressResolver`](crate::geocode::AddressResolver) over the
//! merchant table one record at a time, persisting the result set and a
//! checkpoint every `batch_size` records or `save_interval`, whichever comes
//! first. An interrupted run resumes strictly after the last record whose
//! output was persisted.
//!
//! # Example Usage
//!
//! ```no_run
//! use geogrid::batch::{BatchRunnerBuilder, CheckpointStore};
//! use geogrid::geocode::{AddressResolver, GeocodeCache, KakaoConfig, KakaoProvider, ResolverConfig, SystemClock};
//! use geogrid::source::MerchantTable;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let table = MerchantTable::load("data/raw/merchants.csv".as_ref())?;
//! let provider = KakaoProvider::new(KakaoConfig::new("api-key"))?;
//! let resolver = AddressResolver::new(
//!     Box::new(provider),
//!     GeocodeCache::load("data/raw/geocode_cache.json"),
//!     Arc::new(SystemClock),
//!     ResolverConfig::default(),
//! );
//!
//! let mut runner = BatchRunnerBuilder::new(
//!     resolver,
//!     CheckpointStore::new("data/.checkpoint.json", "data/.geocoded_partial.json"),
//! )
//! .with_batch_size(1000)
//! .build();
//!
//! let outcome = runner.run(&table)?;
//! println!("{} resolved", outcome.stats.resolved);
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod progress;
pub mod runner;

pub use checkpoint::{BatchError, BatchStats, Checkpoint, CheckpointStore, PartialResults, ResumeState};
pub use progress::{RunProgress, Throughput};
pub use runner::{BatchRunner, BatchRunnerBuilder, LookupMode, RunOutcome, RunState, RunnerConfig};
