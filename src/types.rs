//! Core types for the geogrid pipeline

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Version stamped into every JSON document the pipeline writes
pub const DATA_VERSION: &str = "2.0.0";

/// A resolved WGS84 position
///
/// Construction goes through [`Coordinate::new`], which refuses non-finite or
/// out-of-range values, so a `Coordinate` always holds both halves.
/// Deserialization applies the same check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Create a coordinate, returning `None` unless both values are finite and in range
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return None;
        }
        Some(Self { lat, lng })
    }

    /// Parse a coordinate from provider strings (`y` is latitude, `x` is longitude)
    pub fn from_xy(x: &str, y: &str) -> Option<Self> {
        let lng = x.trim().parse::<f64>().ok()?;
        let lat = y.trim().parse::<f64>().ok()?;
        Self::new(lat, lng)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            lat: f64,
            lng: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Coordinate::new(raw.lat, raw.lng).ok_or_else(|| {
            de::Error::custom(format!("coordinate out of range: ({}, {})", raw.lat, raw.lng))
        })
    }
}

/// Gift-certificate form a merchant accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherType {
    Paper,
    Card,
    Mobile,
}

impl VoucherType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Card => "card",
            Self::Mobile => "mobile",
        }
    }
}

impl fmt::Display for VoucherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One merchant in the geocoded output
///
/// The coordinate is flattened into `lat`/`lng` on the wire and omitted
/// entirely for unresolved stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    /// 1-based position in the result set
    pub id: u64,
    /// Display name
    pub name: String,
    /// Location text the lookup was derived from
    pub address: String,
    /// Accepted voucher forms
    pub types: Vec<VoucherType>,
    /// Resolved position, if geocoding succeeded
    #[serde(flatten)]
    pub coordinate: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    /// Road-form address returned by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_address: Option<String>,
    /// Cadastral (lot-number) address returned by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jibun_address: Option<String>,
    /// Place name matched by a keyword lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    pub category: String,
    pub sub_category: String,
    pub naver_url: String,
}

impl Store {
    /// Start building a store
    pub fn builder(id: u64, name: impl Into<String>, address: impl Into<String>) -> StoreBuilder {
        StoreBuilder::new(id, name, address)
    }

    /// Whether this store carries a coordinate
    pub fn is_resolved(&self) -> bool {
        self.coordinate.is_some()
    }
}

/// Builder for [`Store`]
///
/// Every possibly-absent field is taken as an `Option`, so callers pass through
/// whatever the resolver produced without branching on presence.
#[derive(Debug, Clone)]
pub struct StoreBuilder {
    store: Store,
}

impl StoreBuilder {
    /// Create a builder with identifying fields set
    pub fn new(id: u64, name: impl Into<String>, address: impl Into<String>) -> Self {
        let name = name.into();
        let address = address.into();
        let naver_url = naver_search_url(&name, &address);
        Self {
            store: Store {
                id,
                name,
                address,
                types: Vec::new(),
                coordinate: None,
                market: None,
                province: None,
                road_address: None,
                jibun_address: None,
                place_name: None,
                category: String::new(),
                sub_category: String::new(),
                naver_url,
            },
        }
    }

    pub fn types(mut self, types: Vec<VoucherType>) -> Self {
        self.store.types = types;
        self
    }

    pub fn coordinate(mut self, coordinate: Option<Coordinate>) -> Self {
        self.store.coordinate = coordinate;
        self
    }

    pub fn market(mut self, market: Option<String>) -> Self {
        self.store.market = non_empty(market);
        self
    }

    pub fn province(mut self, province: Option<String>) -> Self {
        self.store.province = non_empty(province);
        self
    }

    pub fn road_address(mut self, road_address: Option<String>) -> Self {
        self.store.road_address = non_empty(road_address);
        self
    }

    pub fn jibun_address(mut self, jibun_address: Option<String>) -> Self {
        self.store.jibun_address = non_empty(jibun_address);
        self
    }

    pub fn place_name(mut self, place_name: Option<String>) -> Self {
        self.store.place_name = non_empty(place_name);
        self
    }

    pub fn category(mut self, category: impl Into<String>, sub_category: impl Into<String>) -> Self {
        self.store.category = category.into();
        self.store.sub_category = sub_category.into();
        self
    }

    pub fn build(self) -> Store {
        self.store
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Build a Naver map search link for a merchant
pub fn naver_search_url(name: &str, address: &str) -> String {
    let query = format!("{} {}", name, address);
    match url::Url::parse("https://map.naver.com/v5/search/") {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(query.trim());
            }
            url.to_string()
        }
        Err(_) => format!("https://map.naver.com/v5/search/{}", query.replace(' ', "%20")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_rejects_non_finite() {
        assert!(Coordinate::new(f64::NAN, 127.0).is_none());
        assert!(Coordinate::new(37.5, f64::INFINITY).is_none());
        assert!(Coordinate::new(91.0, 127.0).is_none());
        assert!(Coordinate::new(37.5, 127.0).is_some());
    }

    #[test]
    fn test_coordinate_from_xy() {
        let coord = Coordinate::from_xy("126.9780", "37.5665").unwrap();
        assert!((coord.lat - 37.5665).abs() < 1e-9);
        assert!((coord.lng - 126.9780).abs() < 1e-9);
        assert!(Coordinate::from_xy("", "37.5").is_none());
    }

    #[test]
    fn test_unresolved_store_omits_coordinates() {
        let store = Store::builder(1, "Bakery", "Seoul")
            .types(vec![VoucherType::Paper])
            .category("음식점", "제과점")
            .build();

        let json = serde_json::to_value(&store).unwrap();
        assert!(json.get("lat").is_none());
        assert!(json.get("lng").is_none());
        assert!(json.get("market").is_none());
        assert_eq!(json["subCategory"], "제과점");
        assert_eq!(json["types"][0], "paper");
    }

    #[test]
    fn test_resolved_store_roundtrips_flat_coordinates() {
        let store = Store::builder(7, "Mart", "Busan")
            .coordinate(Coordinate::new(35.1796, 129.0756))
            .road_address(Some("부산 중구 중앙대로 1".to_string()))
            .market(Some("".to_string()))
            .build();

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["lat"], 35.1796);
        assert_eq!(json["lng"], 129.0756);
        assert!(json.get("market").is_none());

        let back: Store = serde_json::from_value(json).unwrap();
        assert_eq!(back, store);
    }

    #[test]
    fn test_coordinate_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<Coordinate>(r#"{"lat":95.0,"lng":127.0}"#).is_err());
        assert!(serde_json::from_str::<Coordinate>(r#"{"lat":37.5,"lng":181.0}"#).is_err());
        let coord: Coordinate = serde_json::from_str(r#"{"lat":37.5,"lng":127.0}"#).unwrap();
        assert_eq!(coord, Coordinate::new(37.5, 127.0).unwrap());
    }

    #[test]
    fn test_store_with_invalid_coordinate_loads_unresolved() {
        let json = r#"{
            "id": 3,
            "name": "Mart",
            "address": "Seoul",
            "types": ["card"],
            "lat": 95.0,
            "lng": 127.0,
            "category": "기타",
            "subCategory": "기타",
            "naverUrl": "https://map.naver.com/v5/search/Mart%20Seoul"
        }"#;
        let store: Store = serde_json::from_str(json).unwrap();
        assert_eq!(store.coordinate, None);
        assert!(!store.is_resolved());
    }

    #[test]
    fn test_naver_url_is_percent_encoded() {
        let url = naver_search_url("Green Cafe", "Seoul Jongno");
        assert!(url.starts_with("https://map.naver.com/v5/search/"));
        assert!(url.contains("Green%20Cafe%20Seoul%20Jongno"));
    }
}
