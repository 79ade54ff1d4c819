//! Input and geocoder configuration

use crate::batch::LookupMode;
use crate::geocode::kakao::{API_KEY_ENV, DEFAULT_ADDRESS_ENDPOINT, DEFAULT_KEYWORD_ENDPOINT};
use crate::geocode::{KakaoConfig, ResolverConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Merchant table location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
}

fn default_csv_path() -> PathBuf {
    PathBuf::from("data/raw/merchants.csv")
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
        }
    }
}

/// Remote geocoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Lookup shape used per record
    pub mode: LookupMode,
    /// REST API key (falls back to KAKAO_REST_API_KEY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub address_endpoint: String,
    pub keyword_endpoint: String,
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
    /// Minimum spacing between network calls (milliseconds)
    pub min_interval_ms: u64,
    /// Attempts per query, first one included
    pub max_attempts: u32,
    /// First backoff delay (milliseconds), doubled per retry
    pub base_delay_ms: u64,
    /// Directory holding the lookup caches
    pub cache_dir: PathBuf,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            mode: LookupMode::Address,
            api_key: None,
            address_endpoint: DEFAULT_ADDRESS_ENDPOINT.to_string(),
            keyword_endpoint: DEFAULT_KEYWORD_ENDPOINT.to_string(),
            timeout_secs: 10,
            min_interval_ms: 100,
            max_attempts: 3,
            base_delay_ms: 2000,
            cache_dir: PathBuf::from("data/raw"),
        }
    }
}

impl GeocoderConfig {
    /// API key from the config, else from the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Cache file for the given mode
    pub fn cache_path(&self, mode: LookupMode) -> PathBuf {
        self.cache_dir.join(mode.cache_file_name())
    }

    pub fn kakao_config(&self, api_key: String) -> KakaoConfig {
        KakaoConfig {
            api_key,
            address_endpoint: self.address_endpoint.clone(),
            keyword_endpoint: self.keyword_endpoint.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay: Duration::from_millis(self.base_delay_ms),
                ..RetryPolicy::default()
            },
            min_interval: Duration::from_millis(self.min_interval_ms),
        }
    }
}
