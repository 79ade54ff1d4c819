//! Merchant table input
//!
//! Reads the public merchant registry (CSV) into [`MerchantRow`]s and derives
//! everything the geocoding stage needs from a row: the location text, the
//! lookup queries, the voucher types and the category labels.
//!
//! The registry is published with Korean column headers; English aliases are
//! accepted so hand-made fixtures stay readable.

pub mod classify;

pub use classify::{categorize, parse_types};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while loading the merchant table
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// One row of the merchant registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MerchantRow {
    #[serde(rename = "가맹점명", alias = "name", default)]
    pub name: String,
    #[serde(rename = "소재지", alias = "province", default)]
    pub province: String,
    #[serde(rename = "소속 시장명(또는 상점가)", alias = "market", default)]
    pub market: String,
    #[serde(rename = "지류형 가맹 여부", alias = "paper", default)]
    pub paper_flag: String,
    #[serde(rename = "디지털형 가맹 여부", alias = "digital", default)]
    pub digital_flag: String,
    #[serde(rename = "취급품목", alias = "items", default)]
    pub items: String,
}

impl MerchantRow {
    /// Create a row from name, province and market
    pub fn new(name: impl Into<String>, province: impl Into<String>, market: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            province: province.into(),
            market: market.into(),
            ..Default::default()
        }
    }

    pub fn with_flags(mut self, paper: &str, digital: &str) -> Self {
        self.paper_flag = paper.to_string();
        self.digital_flag = digital.to_string();
        self
    }

    pub fn with_items(mut self, items: impl Into<String>) -> Self {
        self.items = items.into();
        self
    }

    /// Trim every field and blank out spreadsheet `nan` placeholders
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.name,
            &mut self.province,
            &mut self.market,
            &mut self.paper_flag,
            &mut self.digital_flag,
            &mut self.items,
        ] {
            *field = clean_value(field);
        }
        self
    }

    /// Market name, if present
    pub fn market(&self) -> Option<&str> {
        non_blank(&self.market)
    }

    /// Province / region text, if present
    pub fn province(&self) -> Option<&str> {
        non_blank(&self.province)
    }

    /// Location text used for address lookups: `"{market} {province}"` or the province alone
    pub fn location_text(&self) -> Option<String> {
        match (self.market(), self.province()) {
            (Some(market), Some(province)) => Some(format!("{} {}", market, province)),
            (Some(market), None) => Some(market.to_string()),
            (None, Some(province)) => Some(province.to_string()),
            (None, None) => None,
        }
    }

    /// Whether the row carries enough to be geocoded (a name and some location text)
    pub fn is_complete(&self) -> bool {
        non_blank(&self.name).is_some() && self.location_text().is_some()
    }

    /// Keyword search strategies, most specific first, blanks and duplicates removed
    pub fn keyword_queries(&self) -> Vec<String> {
        let name = self.name.trim();
        let market = self.market().unwrap_or_default();
        let region = self.province().unwrap_or_default();

        let candidates = [
            format!("{} {} {}", name, market, region),
            format!("{} {}", name, market),
            format!("{} {}", name, region),
        ];

        let mut queries: Vec<String> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let collapsed = collapse_whitespace(&candidate);
            if !collapsed.is_empty() && !queries.contains(&collapsed) {
                queries.push(collapsed);
            }
        }
        queries
    }
}

fn clean_value(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("nan") {
        String::new()
    } else {
        trimmed.to_string()
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identity of an input file, used to refuse resuming against a different input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFingerprint {
    /// SHA-256 of the raw file bytes (hex)
    pub sha256: String,
    /// Number of data rows
    pub records: usize,
}

impl InputFingerprint {
    pub fn compute(bytes: &[u8], records: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            sha256: hex::encode(hasher.finalize()),
            records,
        }
    }
}

/// A loaded merchant table
#[derive(Debug, Clone)]
pub struct MerchantTable {
    pub rows: Vec<MerchantRow>,
    pub fingerprint: InputFingerprint,
}

impl MerchantTable {
    /// Load and normalize a CSV file
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse CSV bytes (UTF-8, optional BOM)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SourceError> {
        let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(body);

        let mut rows = Vec::new();
        for result in reader.deserialize::<MerchantRow>() {
            rows.push(result?.normalized());
        }

        let fingerprint = InputFingerprint::compute(bytes, rows.len());
        Ok(Self { rows, fingerprint })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KOREAN_CSV: &str = "\u{feff}가맹점명,소재지,소속 시장명(또는 상점가),지류형 가맹 여부,디지털형 가맹 여부,취급품목\n\
        행복분식,서울 종로구,광장시장,Y,N,분식\n\
        ,부산 중구,자갈치시장,Y,Y,수산물\n\
        나래상회,경기 수원시,nan,N,Y,의류\n";

    #[test]
    fn test_load_korean_headers_with_bom() {
        let table = MerchantTable::from_bytes(KOREAN_CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);

        let first = &table.rows[0];
        assert_eq!(first.name, "행복분식");
        assert_eq!(first.market(), Some("광장시장"));
        assert_eq!(first.paper_flag, "Y");
        assert_eq!(first.location_text().as_deref(), Some("광장시장 서울 종로구"));

        assert!(!table.rows[1].is_complete());
        assert_eq!(table.rows[2].market(), None);
        assert_eq!(table.rows[2].location_text().as_deref(), Some("경기 수원시"));
        assert_eq!(table.fingerprint.records, 3);
    }

    #[test]
    fn test_load_english_aliases() {
        let csv = "name,province,market,paper,digital,items\nA,Seoul,,Y,N,cafe\n";
        let table = MerchantTable::from_bytes(csv.as_bytes()).unwrap();
        assert_eq!(table.rows[0].name, "A");
        assert_eq!(table.rows[0].province(), Some("Seoul"));
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let a = InputFingerprint::compute(b"name\nA\n", 1);
        let b = InputFingerprint::compute(b"name\nB\n", 1);
        assert_ne!(a, b);
        assert_eq!(a, InputFingerprint::compute(b"name\nA\n", 1));
        assert_eq!(a.sha256.len(), 64);
    }

    #[test]
    fn test_keyword_queries_skip_blanks_and_duplicates() {
        let row = MerchantRow::new("행복분식", "서울", "광장시장");
        assert_eq!(
            row.keyword_queries(),
            vec!["행복분식 광장시장 서울", "행복분식 광장시장", "행복분식 서울"]
        );

        let no_market = MerchantRow::new("행복분식", "서울", "");
        assert_eq!(no_market.keyword_queries(), vec!["행복분식 서울", "행복분식"]);
    }

    #[test]
    fn test_incomplete_rows() {
        assert!(!MerchantRow::new("", "Seoul", "").is_complete());
        assert!(!MerchantRow::new("A", " ", "nan").normalized().is_complete());
        assert!(MerchantRow::new("A", "", "Market").is_complete());
    }
}
