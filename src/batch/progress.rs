//! Progress tracking for batch geocoding

use super::checkpoint::BatchStats;
use crate::geocode::Clock;
use crate::util::format_eta;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Throughput snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    /// Records completed since the resume point
    pub done: u64,
    /// Records still to go
    pub remaining: u64,
    pub elapsed: Duration,
    pub per_second: f64,
    /// Estimated seconds remaining, if a rate is known
    pub eta_seconds: Option<f64>,
}

/// Progress bar plus periodic log lines
pub struct RunProgress {
    /// Progress bar (None if running in quiet mode)
    progress_bar: Option<ProgressBar>,
    clock: Arc<dyn Clock>,
    /// Resume point
    start_time: Instant,
    start_index: u64,
    total: u64,
    /// Log a progress line every this many records
    log_interval: u64,
}

impl RunProgress {
    pub fn new(
        clock: Arc<dyn Clock>,
        total: u64,
        start_index: u64,
        log_interval: usize,
        quiet: bool,
    ) -> Self {
        let progress_bar = if !quiet {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_position(start_index);
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: clock.now(),
            clock,
            start_index,
            total,
            log_interval: log_interval.max(1) as u64,
        }
    }

    /// Throughput measured from the resume point, given the absolute count of completed records
    pub fn throughput(&self, completed: u64) -> Throughput {
        let elapsed = self.clock.now().saturating_duration_since(self.start_time);
        let done = completed.saturating_sub(self.start_index);
        let remaining = self.total.saturating_sub(completed);
        let secs = elapsed.as_secs_f64();
        let per_second = if secs > 0.0 { done as f64 / secs } else { 0.0 };
        let eta_seconds = (per_second > 0.0).then(|| remaining as f64 / per_second);

        Throughput {
            done,
            remaining,
            elapsed,
            per_second,
            eta_seconds,
        }
    }

    /// Update after a record completes
    pub fn record_done(&self, stats: &BatchStats, name: &str) {
        let completed = stats.completed();
        let rate = self.throughput(completed);

        if let Some(ref pb) = self.progress_bar {
            pb.set_position(completed);
            pb.set_message(format!(
                "{:.1} rec/s | ok {} fail {} | {}",
                rate.per_second,
                stats.resolved,
                stats.failed,
                crate::util::truncate_chars(name, 20)
            ));
        }

        if rate.done > 0 && rate.done % self.log_interval == 0 {
            let percent = if self.total > 0 {
                completed as f64 / self.total as f64 * 100.0
            } else {
                100.0
            };
            info!(
                "Progress: {}/{} ({:.1}%) | {:.1} rec/s | ETA {} | resolved {} failed {} skipped {}",
                completed,
                self.total,
                percent,
                rate.per_second,
                rate.eta_seconds.map(format_eta).unwrap_or_else(|| "unknown".to_string()),
                stats.resolved,
                stats.failed,
                stats.skipped
            );
        }
    }

    /// Leave the bar in place with a cancellation note
    pub fn interrupted(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.abandon_with_message("Interrupted, checkpoint saved");
        }
    }

    /// Finish the progress bar
    pub fn finish(&self, stats: &BatchStats) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_with_message(format!(
                "Done! {} resolved, {} failed, {} skipped",
                stats.resolved, stats.failed, stats.skipped
            ));
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.start_time)
    }
}
