//! Address resolver: cache, throttle, retry
//!
//! Wraps a [`GeocodeProvider`] so that every query resolves to either a place
//! or an explicit miss. Nothing escapes to the caller as an error:
//!
//! 1. A known cache key is answered locally (hit or cached miss).
//! 2. Otherwise the provider is called, spaced at least `min_interval` after
//!    the previous network call.
//! 3. Transient failures are retried with exponential backoff; definitive
//!    failures and exhausted retries become a miss.
//! 4. The outcome is written to the cache unconditionally.

use super::cache::GeocodeCache;
use super::clock::Clock;
use super::provider::{GeocodeProvider, LookupError, LookupQuery, Place};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry
    pub base_delay: Duration,
    /// Upper bound on any single backoff
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff after the given failed attempt (0-based): `base * 2^attempt`, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Lookup counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverStats {
    /// Queries asked of the resolver
    pub total: u64,
    /// Queries answered with a place
    pub success: u64,
    /// Queries answered with a miss
    pub failed: u64,
    /// Queries answered from the cache
    pub cached: u64,
    /// Calls that reached the provider (retries included)
    pub remote_calls: u64,
    /// Rate-limit responses seen
    pub rate_limited: u64,
}

/// Outcome of one resolver query
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub place: Option<Place>,
    /// Whether the answer came from the cache
    pub cache_hit: bool,
}

/// Resolver configuration
#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    pub retry: RetryPolicy,
    /// Minimum spacing between network calls
    pub min_interval: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            min_interval: Duration::from_millis(100),
        }
    }
}

/// Caching, throttled, retrying front for a geocoding provider
#[derive(Debug)]
pub struct AddressResolver {
    provider: Box<dyn GeocodeProvider>,
    cache: GeocodeCache,
    clock: Arc<dyn Clock>,
    config: ResolverConfig,
    last_call: Option<Instant>,
    stats: ResolverStats,
}

impl AddressResolver {
    pub fn new(
        provider: Box<dyn GeocodeProvider>,
        cache: GeocodeCache,
        clock: Arc<dyn Clock>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            clock,
            config,
            last_call: None,
            stats: ResolverStats::default(),
        }
    }

    /// Resolve one query
    pub fn resolve(&mut self, query: &LookupQuery) -> Resolution {
        self.stats.total += 1;
        let key = query.cache_key();

        if let Some(answer) = self.cache.get(&key) {
            self.stats.cached += 1;
            let place = answer.clone();
            self.count_outcome(&place);
            return Resolution {
                place,
                cache_hit: true,
            };
        }

        let place = self.fetch_with_retry(query);
        self.cache.insert(key, place.clone());
        self.count_outcome(&place);

        Resolution {
            place,
            cache_hit: false,
        }
    }

    /// Try queries in order until one yields a place.
    ///
    /// The returned resolution is the first hit, or the last miss when none hit.
    /// `cache_hit` is true only if every query tried was answered from the cache.
    pub fn resolve_first(&mut self, queries: &[LookupQuery]) -> Resolution {
        let mut all_cached = true;
        for query in queries {
            let resolution = self.resolve(query);
            all_cached &= resolution.cache_hit;
            if resolution.place.is_some() {
                return Resolution {
                    place: resolution.place,
                    cache_hit: all_cached,
                };
            }
        }
        Resolution {
            place: None,
            cache_hit: all_cached && !queries.is_empty(),
        }
    }

    fn count_outcome(&mut self, place: &Option<Place>) {
        if place.is_some() {
            self.stats.success += 1;
        } else {
            self.stats.failed += 1;
        }
    }

    fn fetch_with_retry(&mut self, query: &LookupQuery) -> Option<Place> {
        let max_attempts = self.config.retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            self.throttle();
            self.stats.remote_calls += 1;

            match self.provider.lookup(query) {
                Ok(place) => return place,
                Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                    let mut delay = self.config.retry.backoff(attempt);
                    if let LookupError::RateLimited { retry_after } = &e {
                        self.stats.rate_limited += 1;
                        if let Some(hint) = retry_after {
                            delay = delay.max(*hint).min(self.config.retry.max_delay);
                        }
                        warn!(
                            "Rate limited by {} (attempt {}/{}), backing off {:?}",
                            self.provider.name(),
                            attempt + 1,
                            max_attempts,
                            delay
                        );
                    } else {
                        debug!(
                            "Transient lookup failure for '{}' (attempt {}/{}): {}",
                            query.text(),
                            attempt + 1,
                            max_attempts,
                            e
                        );
                    }
                    self.clock.sleep(delay);
                }
                Err(e) => {
                    if matches!(e, LookupError::RateLimited { .. }) {
                        self.stats.rate_limited += 1;
                    }
                    debug!("Lookup failed for '{}': {}", query.text(), e);
                    return None;
                }
            }
        }

        None
    }

    /// Block until at least `min_interval` has passed since the last network call
    fn throttle(&mut self) {
        let now = self.clock.now();
        if let Some(last) = self.last_call {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.config.min_interval {
                self.clock.sleep(self.config.min_interval - elapsed);
            }
        }
        self.last_call = Some(self.clock.now());
    }

    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut GeocodeCache {
        &mut self.cache
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::clock::MockClock;
    use crate::types::Coordinate;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Provider that replays scripted responses and counts calls
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<Option<Place>, LookupError>>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<Option<Place>, LookupError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl GeocodeProvider for ScriptedProvider {
        fn lookup(&self, query: &LookupQuery) -> Result<Option<Place>, LookupError> {
            self.calls.lock().push(query.text().to_string());
            self.responses.lock().pop_front().unwrap_or(Ok(None))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn seoul() -> Place {
        Place::at(Coordinate::new(37.5665, 126.9780).unwrap())
    }

    fn resolver(
        responses: Vec<Result<Option<Place>, LookupError>>,
    ) -> (AddressResolver, Arc<MockClock>, Arc<Mutex<Vec<String>>>) {
        let provider = ScriptedProvider::new(responses);
        let calls = provider.calls.clone();
        let clock = Arc::new(MockClock::new());
        let resolver = AddressResolver::new(
            Box::new(provider),
            GeocodeCache::in_memory(),
            clock.clone(),
            ResolverConfig::default(),
        );
        (resolver, clock, calls)
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(2));
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(8));
        assert_eq!(policy.backoff(30), Duration::from_secs(60));
    }

    #[test]
    fn test_second_query_served_from_cache() {
        let (mut resolver, _clock, calls) = resolver(vec![Ok(Some(seoul()))]);
        let query = LookupQuery::address("서울 중구");

        let first = resolver.resolve(&query);
        let second = resolver.resolve(&query);

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.place, second.place);
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(resolver.stats().cached, 1);
        assert_eq!(resolver.stats().success, 2);
    }

    #[test]
    fn test_miss_is_cached() {
        let (mut resolver, _clock, calls) = resolver(vec![Ok(None)]);
        let query = LookupQuery::address("nowhere");

        assert!(resolver.resolve(&query).place.is_none());
        let again = resolver.resolve(&query);
        assert!(again.place.is_none());
        assert!(again.cache_hit);
        assert_eq!(calls.lock().len(), 1);
        assert_eq!(resolver.cache().miss_count(), 1);
    }

    #[test]
    fn test_rate_limit_retries_with_backoff() {
        let (mut resolver, clock, calls) = resolver(vec![
            Err(LookupError::RateLimited { retry_after: None }),
            Err(LookupError::Transport("reset".into())),
            Ok(Some(seoul())),
        ]);

        let resolution = resolver.resolve(&LookupQuery::address("서울"));

        assert_eq!(resolution.place, Some(seoul()));
        assert_eq!(calls.lock().len(), 3);
        let backoffs: Vec<Duration> = clock
            .sleeps()
            .into_iter()
            .filter(|d| *d >= Duration::from_secs(1))
            .collect();
        assert_eq!(backoffs, vec![Duration::from_secs(2), Duration::from_secs(4)]);
        assert_eq!(resolver.stats().rate_limited, 1);
    }

    #[test]
    fn test_exhausted_retries_become_cached_miss() {
        let (mut resolver, _clock, calls) = resolver(vec![
            Err(LookupError::Status(503)),
            Err(LookupError::Status(503)),
            Err(LookupError::Status(503)),
            Ok(Some(seoul())),
        ]);
        let query = LookupQuery::address("서울");

        assert!(resolver.resolve(&query).place.is_none());
        assert_eq!(calls.lock().len(), 3);

        // Known-bad query never reaches the network again
        assert!(resolver.resolve(&query).cache_hit);
        assert_eq!(calls.lock().len(), 3);
    }

    #[test]
    fn test_client_error_not_retried() {
        let (mut resolver, clock, calls) = resolver(vec![Err(LookupError::Status(400))]);

        assert!(resolver.resolve(&LookupQuery::address("bad")).place.is_none());
        assert_eq!(calls.lock().len(), 1);
        assert!(clock.sleeps().is_empty());
        assert_eq!(resolver.stats().failed, 1);
    }

    #[test]
    fn test_throttle_spaces_network_calls_only() {
        let (mut resolver, clock, _calls) = resolver(vec![Ok(Some(seoul())), Ok(Some(seoul()))]);

        resolver.resolve(&LookupQuery::address("a"));
        resolver.resolve(&LookupQuery::address("a"));
        resolver.resolve(&LookupQuery::address("b"));

        // One spacing sleep between the two network calls; the cache hit adds none
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(100)]);
    }

    #[test]
    fn test_resolve_first_stops_at_hit() {
        let (mut resolver, _clock, calls) = resolver(vec![Ok(None), Ok(Some(seoul()))]);
        let queries = vec![
            LookupQuery::keyword("가게 시장 서울", Some("서울")),
            LookupQuery::keyword("가게 시장", Some("서울")),
            LookupQuery::keyword("가게 서울", Some("서울")),
        ];

        let resolution = resolver.resolve_first(&queries);
        assert_eq!(resolution.place, Some(seoul()));
        assert!(!resolution.cache_hit);
        assert_eq!(calls.lock().len(), 2);

        let again = resolver.resolve_first(&queries);
        assert!(again.cache_hit);
        assert_eq!(calls.lock().len(), 2);
    }
}
