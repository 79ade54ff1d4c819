//! Batch runner that drives the resolver over the merchant table
//!
//! State machine: `FreshStart → Running → (Interrupted | Completed)`.
//!
//! A checkpoint always names the last record whose output is already in the
//! persisted result set, so a resumed run continues strictly after it.

use super::checkpoint::{BatchError, BatchStats, Checkpoint, CheckpointStore};
use super::progress::RunProgress;
use crate::geocode::{AddressResolver, Clock, LookupQuery, Resolution, ResolverStats, SystemClock};
use crate::source::{categorize, parse_types, MerchantRow, MerchantTable};
use crate::types::Store;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How a row is turned into lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupMode {
    /// One address lookup on the row's location text
    #[default]
    Address,
    /// Keyword lookups on name/market/region combinations, first hit wins
    Keyword,
}

impl LookupMode {
    /// Cache file name used for this mode
    pub fn cache_file_name(&self) -> &'static str {
        match self {
            Self::Address => "geocode_cache.json",
            Self::Keyword => "geocode_keyword_cache.json",
        }
    }
}

impl fmt::Display for LookupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => f.write_str("address"),
            Self::Keyword => f.write_str("keyword"),
        }
    }
}

impl FromStr for LookupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "address" => Ok(Self::Address),
            "keyword" => Ok(Self::Keyword),
            other => Err(format!("Unknown lookup mode '{}' (expected address or keyword)", other)),
        }
    }
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    FreshStart,
    Running,
    Interrupted,
    Completed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FreshStart => "fresh_start",
            Self::Running => "running",
            Self::Interrupted => "interrupted",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Save after this many completed records
    pub batch_size: usize,
    /// ...or after this much time since the last save
    pub save_interval: Duration,
    /// Log a progress line every this many records
    pub progress_interval: usize,
    pub mode: LookupMode,
    /// Stop (as if interrupted) after this many records in this run
    pub max_records: Option<usize>,
    /// Ignore any existing checkpoint
    pub fresh: bool,
    /// No progress bar
    pub quiet: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            save_interval: Duration::from_secs(300),
            progress_interval: 100,
            mode: LookupMode::Address,
            max_records: None,
            fresh: false,
            quiet: false,
        }
    }
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// `Interrupted` or `Completed`
    pub state: RunState,
    /// Whether this run picked up an earlier checkpoint
    pub resumed: bool,
    pub stats: BatchStats,
    pub resolver: ResolverStats,
    /// Index named by the last checkpoint written, if any
    pub last_index: Option<usize>,
    /// Stores in the persisted result set
    pub stores: usize,
    pub elapsed: Duration,
}

/// Checkpointed batch geocoder
pub struct BatchRunner {
    resolver: AddressResolver,
    store: CheckpointStore,
    clock: Arc<dyn Clock>,
    config: RunnerConfig,
    cancel: Arc<AtomicBool>,
    state: RunState,
    stats: BatchStats,
    results: Vec<Store>,
}

impl BatchRunner {
    /// Cancellation flag; setting it stops the run before the next record
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// Output records accumulated so far
    pub fn results(&self) -> &[Store] {
        &self.results
    }

    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    /// Run over `table`, resuming from a consistent checkpoint unless `fresh` is set
    pub fn run(&mut self, table: &MerchantTable) -> Result<RunOutcome, BatchError> {
        let total = table.len();
        let mut next_index = 0;
        let mut last_completed: Option<usize> = None;
        let mut resumed = false;

        self.state = RunState::FreshStart;
        self.results.clear();
        self.stats = BatchStats {
            total: total as u64,
            ..Default::default()
        };

        if self.config.fresh {
            info!("Fresh run requested; ignoring any existing checkpoint");
        } else if let Some(resume) = self.store.load_resume(&table.fingerprint) {
            next_index = resume.next_index;
            last_completed = resume.next_index.checked_sub(1);
            self.stats = resume.stats;
            self.stats.total = total as u64;
            self.results = resume.results;
            resumed = true;
        }

        info!(
            "Geocoding {} records ({} mode, provider {}), starting at index {}",
            total,
            self.config.mode,
            self.resolver.provider_name(),
            next_index
        );

        let progress = RunProgress::new(
            self.clock.clone(),
            total as u64,
            next_index as u64,
            self.config.progress_interval,
            self.config.quiet,
        );

        self.state = RunState::Running;
        let mut since_save = 0usize;
        let mut last_save = self.clock.now();
        let mut done_this_run = 0usize;
        let mut saved_index = if resumed { last_completed } else { None };

        for (index, row) in table.rows.iter().enumerate().skip(next_index) {
            if self.cancel.load(Ordering::Relaxed) {
                info!("Cancellation requested before record {}", index);
                self.state = RunState::Interrupted;
                break;
            }
            if let Some(max) = self.config.max_records {
                if done_this_run >= max {
                    info!("Reached record limit: {}", max);
                    self.state = RunState::Interrupted;
                    break;
                }
            }

            self.process_row(row);
            last_completed = Some(index);
            done_this_run += 1;
            since_save += 1;
            progress.record_done(&self.stats, &row.name);

            if self.save_due(since_save, last_save) {
                self.persist(index, table)?;
                saved_index = Some(index);
                since_save = 0;
                last_save = self.clock.now();
            }
        }

        if self.state == RunState::Running {
            self.state = RunState::Completed;
        }

        match last_completed {
            Some(index) if saved_index != Some(index) || self.state == RunState::Completed => {
                self.persist(index, table)?;
                saved_index = Some(index);
            }
            Some(_) => {}
            None => {
                // Nothing to point a checkpoint at; keep the (possibly empty) cache anyway
                self.resolver.cache_mut().save()?;
            }
        }

        match self.state {
            RunState::Completed => progress.finish(&self.stats),
            _ => progress.interrupted(),
        }

        let outcome = RunOutcome {
            state: self.state,
            resumed,
            stats: self.stats.clone(),
            resolver: self.resolver.stats().clone(),
            last_index: saved_index,
            stores: self.results.len(),
            elapsed: progress.elapsed(),
        };
        log_summary(&outcome);
        Ok(outcome)
    }

    fn save_due(&self, since_save: usize, last_save: Instant) -> bool {
        since_save >= self.config.batch_size.max(1)
            || self.clock.now().saturating_duration_since(last_save) >= self.config.save_interval
    }

    /// Cache, then results, then checkpoint
    fn persist(&mut self, last_index: usize, table: &MerchantTable) -> Result<(), BatchError> {
        self.resolver.cache_mut().save()?;
        let checkpoint = Checkpoint::new(last_index, self.stats.clone(), Some(table.fingerprint.clone()));
        self.store.save(&checkpoint, &self.results)?;
        Ok(())
    }

    fn process_row(&mut self, row: &MerchantRow) {
        let Some(location) = row.location_text().filter(|_| row.is_complete()) else {
            debug!("Skipping incomplete record: name='{}'", row.name);
            self.stats.skipped += 1;
            return;
        };
        self.stats.processed += 1;

        let resolution = self.lookup(row, &location);
        if resolution.cache_hit {
            self.stats.cached += 1;
        }
        if resolution.place.is_some() {
            self.stats.resolved += 1;
        } else {
            self.stats.failed += 1;
        }

        let (category, sub_category) = categorize(&row.items);
        let place = resolution.place;
        let store = Store::builder(self.results.len() as u64 + 1, row.name.trim(), location)
            .types(parse_types(&row.paper_flag, &row.digital_flag))
            .coordinate(place.as_ref().map(|p| p.coordinate))
            .market(row.market().map(str::to_string))
            .province(row.province().map(str::to_string))
            .road_address(place.as_ref().and_then(|p| p.road_address.clone()))
            .jibun_address(place.as_ref().and_then(|p| p.jibun_address.clone()))
            .place_name(place.as_ref().and_then(|p| p.place_name.clone()))
            .category(category, sub_category)
            .build();

        self.results.push(store);
    }

    fn lookup(&mut self, row: &MerchantRow, location: &str) -> Resolution {
        match self.config.mode {
            LookupMode::Address => self.resolver.resolve(&LookupQuery::address(location)),
            LookupMode::Keyword => {
                let queries: Vec<LookupQuery> = row
                    .keyword_queries()
                    .into_iter()
                    .map(|q| LookupQuery::keyword(q, row.province()))
                    .collect();
                self.resolver.resolve_first(&queries)
            }
        }
    }
}

fn log_summary(outcome: &RunOutcome) {
    let stats = &outcome.stats;
    info!(
        "Geocoding {}: {}/{} records, {} resolved, {} failed, {} skipped, {} cached",
        outcome.state,
        stats.completed(),
        stats.total,
        stats.resolved,
        stats.failed,
        stats.skipped,
        stats.cached
    );
    info!(
        "Success rate {:.1}%, {} remote calls, {} cache hits, elapsed {:.1}s",
        stats.success_rate(),
        outcome.resolver.remote_calls,
        outcome.resolver.cached,
        outcome.elapsed.as_secs_f64()
    );
}

/// Builder for [`BatchRunner`]
pub struct BatchRunnerBuilder {
    resolver: AddressResolver,
    store: CheckpointStore,
    clock: Arc<dyn Clock>,
    config: RunnerConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl BatchRunnerBuilder {
    pub fn new(resolver: AddressResolver, store: CheckpointStore) -> Self {
        Self {
            resolver,
            store,
            clock: Arc::new(SystemClock),
            config: RunnerConfig::default(),
            cancel: None,
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock for save intervals and progress; share it with the resolver
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.config.save_interval = interval;
        self
    }

    pub fn with_mode(mut self, mode: LookupMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn with_max_records(mut self, max: Option<usize>) -> Self {
        self.config.max_records = max;
        self
    }

    pub fn with_fresh(mut self, fresh: bool) -> Self {
        self.config.fresh = fresh;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.config.quiet = quiet;
        self
    }

    /// Share an externally owned cancellation flag (e.g. set from a signal handler)
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> BatchRunner {
        BatchRunner {
            resolver: self.resolver,
            store: self.store,
            clock: self.clock,
            config: self.config,
            cancel: self.cancel.unwrap_or_default(),
            state: RunState::FreshStart,
            stats: BatchStats::default(),
            results: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{
        GeocodeCache, GeocodeProvider, LookupError, MockClock, Place, ResolverConfig,
    };
    use crate::types::Coordinate;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Resolves any query containing "Seoul"; counts nothing
    #[derive(Debug)]
    struct SeoulOnly;

    impl GeocodeProvider for SeoulOnly {
        fn lookup(&self, query: &LookupQuery) -> Result<Option<Place>, LookupError> {
            if query.text().contains("Seoul") {
                Ok(Some(Place::at(Coordinate::new(37.5665, 126.9780).unwrap())))
            } else {
                Ok(None)
            }
        }

        fn name(&self) -> &str {
            "seoul-only"
        }
    }

    fn table(rows: Vec<MerchantRow>) -> MerchantTable {
        let fingerprint = crate::source::InputFingerprint::compute(
            format!("{:?}", rows).as_bytes(),
            rows.len(),
        );
        MerchantTable { rows, fingerprint }
    }

    fn runner(dir: &TempDir, clock: Arc<MockClock>) -> BatchRunnerBuilder {
        let resolver = AddressResolver::new(
            Box::new(SeoulOnly),
            GeocodeCache::load(dir.path().join("cache.json")),
            clock.clone(),
            ResolverConfig::default(),
        );
        let store = CheckpointStore::new(
            dir.path().join(".checkpoint.json"),
            dir.path().join(".partial.json"),
        );
        BatchRunnerBuilder::new(resolver, store)
            .with_clock(clock)
            .with_quiet(true)
    }

    #[test]
    fn test_lookup_mode_parse() {
        assert_eq!("Keyword".parse::<LookupMode>().unwrap(), LookupMode::Keyword);
        assert!("fuzzy".parse::<LookupMode>().is_err());
        assert_eq!(LookupMode::Keyword.cache_file_name(), "geocode_keyword_cache.json");
    }

    #[test]
    fn test_skipped_and_failed_are_distinct() {
        let temp_dir = TempDir::new().unwrap();
        let mut runner = runner(&temp_dir, Arc::new(MockClock::new())).build();

        let outcome = runner
            .run(&table(vec![
                MerchantRow::new("A", "Seoul", ""),
                MerchantRow::new("", "Seoul", ""),
                MerchantRow::new("B", "Busan", ""),
            ]))
            .unwrap();

        assert_eq!(outcome.state, RunState::Completed);
        assert_eq!(outcome.stats.processed, 2);
        assert_eq!(outcome.stats.skipped, 1);
        assert_eq!(outcome.stats.resolved, 1);
        assert_eq!(outcome.stats.failed, 1);
        assert_eq!(outcome.last_index, Some(2));

        let results = runner.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].id, 2);
        assert!(results[0].is_resolved());
        assert!(!results[1].is_resolved());
    }

    #[test]
    fn test_batch_size_triggers_intermediate_saves() {
        let temp_dir = TempDir::new().unwrap();
        let mut runner = runner(&temp_dir, Arc::new(MockClock::new()))
            .with_batch_size(2)
            .with_max_records(Some(3))
            .build();

        let rows = (0..5).map(|i| MerchantRow::new(format!("S{}", i), "Seoul", "")).collect();
        let outcome = runner.run(&table(rows)).unwrap();

        assert_eq!(outcome.state, RunState::Interrupted);
        assert_eq!(outcome.last_index, Some(2));
        let checkpoint = Checkpoint::load(&temp_dir.path().join(".checkpoint.json")).unwrap();
        assert_eq!(checkpoint.last_index, 2);
        assert_eq!(checkpoint.stats.processed, 3);
    }

    #[test]
    fn test_elapsed_interval_triggers_save() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(MockClock::new());
        let runner = runner(&temp_dir, clock.clone())
            .with_batch_size(1000)
            .with_save_interval(Duration::from_millis(150))
            .build();

        assert!(!runner.save_due(1, clock.now()));
        let earlier = clock.now();
        clock.advance(Duration::from_millis(150));
        assert!(runner.save_due(1, earlier));
    }

    /// Resolves everything and notes, per lookup, which index the on-disk checkpoint names
    #[derive(Debug)]
    struct CheckpointWatcher {
        checkpoint_path: PathBuf,
        seen: Arc<Mutex<Vec<Option<usize>>>>,
    }

    impl GeocodeProvider for CheckpointWatcher {
        fn lookup(&self, _query: &LookupQuery) -> Result<Option<Place>, LookupError> {
            let last_index = Checkpoint::load(&self.checkpoint_path).map(|c| c.last_index);
            self.seen.lock().push(last_index);
            Ok(Some(Place::at(Coordinate::new(37.5665, 126.9780).unwrap())))
        }

        fn name(&self) -> &str {
            "checkpoint-watcher"
        }
    }

    #[test]
    fn test_save_interval_checkpoints_mid_run() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(MockClock::new());
        let checkpoint_path = temp_dir.path().join(".checkpoint.json");
        let seen = Arc::new(Mutex::new(Vec::new()));

        // Each network call after the first waits 100ms of virtual time
        let resolver = AddressResolver::new(
            Box::new(CheckpointWatcher {
                checkpoint_path: checkpoint_path.clone(),
                seen: seen.clone(),
            }),
            GeocodeCache::load(temp_dir.path().join("cache.json")),
            clock.clone(),
            ResolverConfig {
                min_interval: Duration::from_millis(100),
                ..ResolverConfig::default()
            },
        );
        let store = CheckpointStore::new(checkpoint_path.clone(), temp_dir.path().join(".partial.json"));
        let mut runner = BatchRunnerBuilder::new(resolver, store)
            .with_clock(clock)
            .with_quiet(true)
            .with_batch_size(1000)
            .with_save_interval(Duration::from_millis(150))
            .build();

        let rows = (0..5)
            .map(|i| MerchantRow::new(format!("S{}", i), "Seoul", format!("M{}", i)))
            .collect();
        let outcome = runner.run(&table(rows)).unwrap();

        assert_eq!(outcome.state, RunState::Completed);
        // Lookups run at t=0,100,200,300,400ms; the save after record 2 (t=200) is the first
        assert_eq!(*seen.lock(), vec![None, None, None, Some(2), Some(2)]);
        assert_eq!(Checkpoint::load(&checkpoint_path).unwrap().last_index, 4);
    }

    #[test]
    fn test_cache_write_failure_leaves_no_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(MockClock::new());
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let resolver = AddressResolver::new(
            Box::new(SeoulOnly),
            GeocodeCache::load(blocker.join("cache.json")),
            clock.clone(),
            ResolverConfig::default(),
        );
        let store = CheckpointStore::new(
            temp_dir.path().join(".checkpoint.json"),
            temp_dir.path().join(".partial.json"),
        );
        let mut runner = BatchRunnerBuilder::new(resolver, store)
            .with_clock(clock)
            .with_quiet(true)
            .build();

        let result = runner.run(&table(vec![MerchantRow::new("A", "Seoul", "")]));

        assert!(matches!(result, Err(BatchError::Cache(_))));
        assert!(!temp_dir.path().join(".checkpoint.json").exists());
        assert!(!temp_dir.path().join(".partial.json").exists());
    }

    #[test]
    fn test_cancel_before_first_record_writes_no_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let mut runner = runner(&temp_dir, Arc::new(MockClock::new())).build();
        runner.cancel_flag().store(true, Ordering::Relaxed);

        let outcome = runner
            .run(&table(vec![MerchantRow::new("A", "Seoul", "")]))
            .unwrap();

        assert_eq!(outcome.state, RunState::Interrupted);
        assert_eq!(outcome.last_index, None);
        assert!(!temp_dir.path().join(".checkpoint.json").exists());
    }

    #[test]
    fn test_keyword_mode_uses_region_hint() {
        let temp_dir = TempDir::new().unwrap();
        let mut runner = runner(&temp_dir, Arc::new(MockClock::new()))
            .with_mode(LookupMode::Keyword)
            .build();

        runner
            .run(&table(vec![MerchantRow::new("Cafe", "Seoul", "Gwangjang")]))
            .unwrap();

        let cache = runner.resolver().cache();
        assert!(cache.contains("Cafe Gwangjang Seoul_Seoul"));
        assert_eq!(cache.len(), 1);
        assert!(runner.results()[0].is_resolved());
    }
}
