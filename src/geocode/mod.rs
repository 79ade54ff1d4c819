//! Geocoding with a persistent cache, retry and throttling
//!
//! The [`AddressResolver`] is the only thing the batch runner talks to. It
//! owns a [`GeocodeCache`] and a boxed [`GeocodeProvider`], and routes every
//! wait (inter-call spacing, backoff) through a [`Clock`].
//!
//! # Example Configuration
//!
//! ```toml
//! [geocoder]
//! mode = "keyword"
//! min_interval_ms = 100
//! max_attempts = 3
//! base_delay_ms = 2000
//! cache_dir = "data/raw"
//! ```

pub mod cache;
pub mod clock;
pub mod kakao;
pub mod provider;
pub mod resolver;

pub use cache::{CacheError, CachedAnswer, GeocodeCache};
pub use clock::{Clock, MockClock, SystemClock};
pub use kakao::{KakaoConfig, KakaoProvider};
pub use provider::{GeocodeProvider, LookupError, LookupQuery, Place};
pub use resolver::{AddressResolver, Resolution, ResolverConfig, ResolverStats, RetryPolicy};
