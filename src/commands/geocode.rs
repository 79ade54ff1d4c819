use anyhow::{Context, Result};
use geogrid::{
    batch::{BatchRunnerBuilder, CheckpointStore, LookupMode, RunOutcome, RunState},
    config::Config,
    geocode::{kakao::API_KEY_ENV, AddressResolver, GeocodeCache, KakaoProvider, SystemClock},
    source::MerchantTable,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run_geocode(
    config: Config,
    input: Option<PathBuf>,
    mode: Option<LookupMode>,
    fresh: bool,
    limit: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let mode = mode.unwrap_or(config.geocoder.mode);
    let input = input.unwrap_or_else(|| config.input.csv_path.clone());

    let api_key = config.geocoder.resolve_api_key().with_context(|| {
        format!(
            "No geocoder API key: set [geocoder].api_key or the {} environment variable",
            API_KEY_ENV
        )
    })?;

    let table = MerchantTable::load(&input)
        .with_context(|| format!("Failed to load merchant table {}", input.display()))?;
    info!("Loaded {} records from {}", table.len(), input.display());

    // Checked between records; the in-flight record finishes first
    let cancel = Arc::new(AtomicBool::new(false));
    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, saving checkpoint after the current record");
            signal_flag.store(true, Ordering::Relaxed);
        }
    });

    let geocoder = config.geocoder.clone();
    let checkpoint = config.checkpoint.clone();

    // The blocking HTTP client must be created and dropped off the async runtime
    let outcome: RunOutcome = tokio::task::spawn_blocking(move || -> Result<RunOutcome> {
        let provider = KakaoProvider::new(geocoder.kakao_config(api_key))
            .context("Failed to initialize geocoding provider")?;
        let clock = Arc::new(SystemClock);
        let resolver = AddressResolver::new(
            Box::new(provider),
            GeocodeCache::load(geocoder.cache_path(mode)),
            clock.clone(),
            geocoder.resolver_config(),
        );
        let store = CheckpointStore::new(&checkpoint.checkpoint_path, &checkpoint.results_path);

        let mut runner = BatchRunnerBuilder::new(resolver, store)
            .with_config(checkpoint.runner_config())
            .with_clock(clock)
            .with_mode(mode)
            .with_fresh(fresh)
            .with_max_records(limit)
            .with_quiet(quiet)
            .with_cancel_flag(cancel)
            .build();

        Ok(runner.run(&table)?)
    })
    .await
    .context("Geocoding task panicked")??;

    print_outcome(&outcome, &config);
    Ok(())
}

fn print_outcome(outcome: &RunOutcome, config: &Config) {
    let stats = &outcome.stats;

    println!("\nGeocoding {}", outcome.state);
    println!("==================");
    println!("Records:        {}/{}", stats.completed(), stats.total);
    println!("Processed:      {}", stats.processed);
    println!("Resolved:       {}", stats.resolved);
    println!("Failed:         {}", stats.failed);
    println!("Skipped:        {}", stats.skipped);
    println!("Cached:         {}", stats.cached);
    println!("Success rate:   {:.1}%", stats.success_rate());
    println!("Remote calls:   {}", outcome.resolver.remote_calls);
    println!("Elapsed time:   {:.1}s", outcome.elapsed.as_secs_f64());
    println!("\nResults saved to: {}", config.checkpoint.results_path.display());

    if outcome.state == RunState::Interrupted {
        println!("\nTo resume, run:");
        println!("  geogrid geocode");
    } else {
        println!("\nNext step:");
        println!("  geogrid grid");
    }
}
