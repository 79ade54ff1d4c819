//! Kakao Local API provider
//!
//! Supports both lookup shapes the service offers:
//! - address search (`/v2/local/search/address.json`)
//! - keyword search (`/v2/local/search/keyword.json`)
//!
//! Only the first (best) document of a response is used.

use super::provider::{GeocodeProvider, LookupError, LookupQuery, Place};
use crate::types::Coordinate;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable holding the REST API key
pub const API_KEY_ENV: &str = "KAKAO_REST_API_KEY";

pub const DEFAULT_ADDRESS_ENDPOINT: &str = "https://dapi.kakao.com/v2/local/search/address.json";
pub const DEFAULT_KEYWORD_ENDPOINT: &str = "https://dapi.kakao.com/v2/local/search/keyword.json";

/// Configuration for the Kakao provider
#[derive(Debug, Clone)]
pub struct KakaoConfig {
    pub api_key: String,
    pub address_endpoint: String,
    pub keyword_endpoint: String,
    pub timeout: Duration,
}

impl KakaoConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            address_endpoint: DEFAULT_ADDRESS_ENDPOINT.to_string(),
            keyword_endpoint: DEFAULT_KEYWORD_ENDPOINT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Blocking client for the Kakao Local API
#[derive(Debug)]
pub struct KakaoProvider {
    client: Client,
    config: KakaoConfig,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct AddressResponse {
    meta: Meta,
    #[serde(default)]
    documents: Vec<AddressDocument>,
}

#[derive(Debug, Deserialize)]
struct AddressDocument {
    #[serde(default)]
    address: Option<AddressPart>,
    #[serde(default)]
    road_address: Option<AddressPart>,
}

#[derive(Debug, Deserialize)]
struct AddressPart {
    address_name: String,
    x: String,
    y: String,
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    meta: Meta,
    #[serde(default)]
    documents: Vec<KeywordDocument>,
}

#[derive(Debug, Deserialize)]
struct KeywordDocument {
    #[serde(default)]
    place_name: String,
    #[serde(default)]
    address_name: String,
    #[serde(default)]
    road_address_name: String,
    #[serde(default)]
    category_name: String,
    x: String,
    y: String,
}

impl KakaoProvider {
    /// Create a new provider
    pub fn new(config: KakaoConfig) -> Result<Self, LookupError> {
        info!(
            "Initializing Kakao geocoding provider: address={}, keyword={}",
            config.address_endpoint, config.keyword_endpoint
        );

        let mut headers = HeaderMap::new();
        let auth_value = format!("KakaoAK {}", config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| LookupError::Transport(format!("Invalid API key format: {}", e)))?,
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| LookupError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, LookupError> {
        let response = self.client.get(endpoint).query(params).send()?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(LookupError::RateLimited { retry_after });
        }

        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        Ok(response.text()?)
    }
}

impl GeocodeProvider for KakaoProvider {
    fn lookup(&self, query: &LookupQuery) -> Result<Option<Place>, LookupError> {
        match query {
            LookupQuery::Address(address) => {
                debug!("Kakao address search: {}", address);
                let body = self.get(&self.config.address_endpoint, &[("query", address.as_str())])?;
                parse_address_response(&body)
            }
            LookupQuery::Keyword { query, region } => {
                debug!("Kakao keyword search: {} (region: {:?})", query, region);
                let mut params = vec![("query", query.as_str())];
                if let Some(region) = region {
                    params.push(("region", region.as_str()));
                }
                let body = self.get(&self.config.keyword_endpoint, &params)?;
                parse_keyword_response(&body)
            }
        }
    }

    fn name(&self) -> &str {
        "kakao"
    }
}

/// Parse an address-search response body.
///
/// The road-form address is preferred over the cadastral one for both the
/// coordinate and the address text; the other form is kept alongside.
pub fn parse_address_response(body: &str) -> Result<Option<Place>, LookupError> {
    let response: AddressResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Decode(e.to_string()))?;

    if response.meta.total_count == 0 {
        return Ok(None);
    }
    let Some(doc) = response.documents.into_iter().next() else {
        return Ok(None);
    };

    let road = doc.road_address.as_ref().and_then(|part| {
        Coordinate::from_xy(&part.x, &part.y).map(|c| (c, part.address_name.clone()))
    });
    let jibun = doc.address.as_ref().and_then(|part| {
        Coordinate::from_xy(&part.x, &part.y).map(|c| (c, part.address_name.clone()))
    });

    let place = match (road, jibun) {
        (Some((coordinate, road_name)), jibun) => Place {
            road_address: Some(road_name),
            jibun_address: jibun.map(|(_, name)| name),
            ..Place::at(coordinate)
        },
        (None, Some((coordinate, jibun_name))) => Place {
            jibun_address: Some(jibun_name),
            ..Place::at(coordinate)
        },
        (None, None) => return Ok(None),
    };

    Ok(Some(place))
}

/// Parse a keyword-search response body
pub fn parse_keyword_response(body: &str) -> Result<Option<Place>, LookupError> {
    let response: KeywordResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Decode(e.to_string()))?;

    if response.meta.total_count == 0 {
        return Ok(None);
    }
    let Some(doc) = response.documents.into_iter().next() else {
        return Ok(None);
    };
    let Some(coordinate) = Coordinate::from_xy(&doc.x, &doc.y) else {
        return Ok(None);
    };

    let non_empty = |s: String| (!s.trim().is_empty()).then_some(s);

    Ok(Some(Place {
        coordinate,
        road_address: non_empty(doc.road_address_name),
        jibun_address: non_empty(doc.address_name),
        place_name: non_empty(doc.place_name),
        category: non_empty(doc.category_name),
    }))
}
