//! Geohash encoding and decoding
//!
//! Standard base32 geohash: bits alternate longitude/latitude starting with
//! longitude, five bits per character.

use crate::types::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest supported geohash
pub const MAX_PRECISION: u8 = 12;

/// Geohash length, always within `1..=12`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Precision(u8);

impl Precision {
    /// Roughly 4.9 km × 4.9 km cells
    pub const DEFAULT: Precision = Precision(5);

    pub fn new(value: u8) -> Result<Self, GeohashError> {
        if (1..=MAX_PRECISION).contains(&value) {
            Ok(Self(value))
        } else {
            Err(GeohashError::InvalidPrecision(value))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Precision {
    type Error = GeohashError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Precision> for u8 {
    fn from(p: Precision) -> u8 {
        p.0
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeohashError {
    #[error("Geohash precision {0} is outside 1..=12")]
    InvalidPrecision(u8),

    #[error("Invalid geohash character '{0}'")]
    InvalidChar(char),

    #[error("Empty geohash")]
    Empty,
}

/// Axis-aligned cell rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    /// Whether `coord` lies inside (edges included)
    pub fn contains(&self, coord: &Coordinate) -> bool {
        coord.lat >= self.south
            && coord.lat <= self.north
            && coord.lng >= self.west
            && coord.lng <= self.east
    }
}

/// Decoded cell: center plus half-extent on each axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedCell {
    pub lat: f64,
    pub lng: f64,
    pub lat_err: f64,
    pub lng_err: f64,
}

impl DecodedCell {
    pub fn center(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lng: self.lng,
        }
    }

    /// Center ± error on each axis
    pub fn bounds(&self) -> Bounds {
        Bounds {
            north: self.lat + self.lat_err,
            south: self.lat - self.lat_err,
            east: self.lng + self.lng_err,
            west: self.lng - self.lng_err,
        }
    }
}

/// Encode a coordinate at the given precision
pub fn encode(coord: &Coordinate, precision: Precision) -> String {
    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lng_range = (-180.0f64, 180.0f64);
    let mut hash = String::with_capacity(precision.get() as usize);
    let mut even = true;

    for _ in 0..precision.get() {
        let mut idx = 0usize;
        for _ in 0..5 {
            let (range, value) = if even {
                (&mut lng_range, coord.lng)
            } else {
                (&mut lat_range, coord.lat)
            };
            let mid = (range.0 + range.1) / 2.0;
            idx <<= 1;
            if value >= mid {
                idx |= 1;
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
        hash.push(BASE32[idx] as char);
    }

    hash
}

/// Decode a geohash to its center and half-extents
pub fn decode(hash: &str) -> Result<DecodedCell, GeohashError> {
    if hash.is_empty() {
        return Err(GeohashError::Empty);
    }

    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lng_range = (-180.0f64, 180.0f64);
    let mut even = true;

    for c in hash.chars() {
        let lower = c.to_ascii_lowercase();
        let idx = BASE32
            .iter()
            .position(|&b| b as char == lower)
            .ok_or(GeohashError::InvalidChar(c))?;

        for bit in (0..5).rev() {
            let range = if even { &mut lng_range } else { &mut lat_range };
            let mid = (range.0 + range.1) / 2.0;
            if (idx >> bit) & 1 == 1 {
                range.0 = mid;
            } else {
                range.1 = mid;
            }
            even = !even;
        }
    }

    Ok(DecodedCell {
        lat: (lat_range.0 + lat_range.1) / 2.0,
        lng: (lng_range.0 + lng_range.1) / 2.0,
        lat_err: (lat_range.1 - lat_range.0) / 2.0,
        lng_err: (lng_range.1 - lng_range.0) / 2.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    #[test]
    fn test_precision_range() {
        assert!(Precision::new(0).is_err());
        assert!(Precision::new(13).is_err());
        assert_eq!(Precision::new(12).unwrap().get(), 12);
        assert_eq!(Precision::default().get(), 5);
    }

    #[test]
    fn test_encode_known_values() {
        // Reference points from the geohash literature
        assert_eq!(encode(&coord(57.64911, 10.40744), Precision::new(11).unwrap()), "u4pruydqqvj");
        assert_eq!(encode(&coord(42.6, -5.6), Precision::new(5).unwrap()), "ezs42");
        assert_eq!(encode(&coord(37.5665, 126.9780), Precision::new(5).unwrap()), "wydm9");
    }

    #[test]
    fn test_decode_contains_encoded_point() {
        let seoul = coord(37.5665, 126.9780);
        for p in 1..=MAX_PRECISION {
            let precision = Precision::new(p).unwrap();
            let hash = encode(&seoul, precision);
            assert_eq!(hash.len(), p as usize);
            let cell = decode(&hash).unwrap();
            assert!(cell.bounds().contains(&seoul), "precision {}", p);
        }
    }

    #[test]
    fn test_decode_error_margins() {
        let cell = decode("ezs42").unwrap();
        assert!((cell.lat - 42.60498046875).abs() < 1e-9);
        assert!((cell.lng - -5.60302734375).abs() < 1e-9);
        assert!((cell.lat_err - 0.02197265625).abs() < 1e-12);
        assert!((cell.lng_err - 0.02197265625).abs() < 1e-12);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(decode(""), Err(GeohashError::Empty));
        assert_eq!(decode("ezsa2"), Err(GeohashError::InvalidChar('a')));
    }

    #[test]
    fn test_precision_serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<Precision>("13").is_err());
        assert_eq!(serde_json::from_str::<Precision>("6").unwrap().get(), 6);
    }
}
