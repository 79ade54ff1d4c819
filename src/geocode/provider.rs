//! Geocoding provider trait definitions
//!
//! Defines the seam between the resolver (caching, retry, throttling) and the
//! remote lookup service. Implementations perform exactly one remote call per
//! `lookup` and report failures without retrying.

use crate::types::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

/// Errors a provider can report for a single remote call
#[derive(Debug, Clone, thiserror::Error)]
pub enum LookupError {
    /// Provider asked us to slow down (HTTP 429)
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested delay, if the provider sent one
        retry_after: Option<Duration>,
    },

    /// Connection failure, timeout, or other transport problem
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl LookupError {
    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Transport(_) => true,
            Self::Status(code) => *code >= 500,
            Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) if status == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                LookupError::RateLimited { retry_after: None }
            }
            Some(status) => LookupError::Status(status.as_u16()),
            None if e.is_decode() => LookupError::Decode(e.to_string()),
            None => LookupError::Transport(e.to_string()),
        }
    }
}

/// The two lookup shapes the remote service offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupQuery {
    /// Structured address search
    Address(String),
    /// Free-text place search with an optional region hint
    Keyword { query: String, region: Option<String> },
}

impl LookupQuery {
    pub fn address(address: impl Into<String>) -> Self {
        Self::Address(address.into())
    }

    pub fn keyword(query: impl Into<String>, region: Option<&str>) -> Self {
        Self::Keyword {
            query: query.into(),
            region: region.filter(|r| !r.trim().is_empty()).map(str::to_string),
        }
    }

    /// Stable cache key for this query.
    ///
    /// Address lookups key on the raw address; keyword lookups on `"{query}_{region}"`
    /// (or the bare query when there is no region).
    pub fn cache_key(&self) -> String {
        match self {
            Self::Address(address) => address.clone(),
            Self::Keyword { query, region: Some(region) } => format!("{}_{}", query, region),
            Self::Keyword { query, region: None } => query.clone(),
        }
    }

    /// Query text sent to the provider
    pub fn text(&self) -> &str {
        match self {
            Self::Address(address) => address,
            Self::Keyword { query, .. } => query,
        }
    }
}

/// Best match returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    /// Road-form address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_address: Option<String>,
    /// Cadastral address
    #[serde(default, rename = "address", skip_serializing_if = "Option::is_none")]
    pub jibun_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Place {
    /// A place with only a coordinate
    pub fn at(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            road_address: None,
            jibun_address: None,
            place_name: None,
            category: None,
        }
    }
}

/// Core trait for geocoding providers
///
/// The trait is object-safe so the resolver can hold a `Box<dyn GeocodeProvider>`.
pub trait GeocodeProvider: Send + Debug {
    /// Perform one remote lookup. `Ok(None)` is a definitive "no match".
    fn lookup(&self, query: &LookupQuery) -> Result<Option<Place>, LookupError>;

    /// Provider name (e.g. "kakao")
    fn name(&self) -> &str;
}
