//! Voucher-type parsing and category heuristics
//!
//! Categories come from a fixed keyword table matched against the free-text
//! item description. The first matching group wins.

use crate::types::VoucherType;
use crate::util::truncate_chars;

/// Fallback category label
pub const OTHER: &str = "기타";

const FOOD_KEYWORDS: &[&str] = &[
    "음식", "식당", "한식", "중식", "일식", "양식", "분식", "치킨", "피자", "카페", "커피", "빵",
    "제과", "떡", "도너츠", "베이커리",
];
const GROCERY_KEYWORDS: &[&str] = &["마트", "슈퍼", "정육", "수산", "채소", "과일", "야채"];
const FASHION_KEYWORDS: &[&str] = &["의류", "옷", "신발", "가방", "패션", "양복", "한복"];
const BEAUTY_KEYWORDS: &[&str] = &["미용", "헤어", "네일", "피부", "화장품"];
const SERVICE_KEYWORDS: &[&str] = &["세탁", "수선", "열쇠", "복사", "인쇄", "사진"];

/// Parse the paper / digital acceptance flags (`"Y"` means accepted).
///
/// A row with neither flag set is assumed to accept every form.
pub fn parse_types(paper_flag: &str, digital_flag: &str) -> Vec<VoucherType> {
    let mut types = Vec::with_capacity(3);
    if paper_flag.trim() == "Y" {
        types.push(VoucherType::Paper);
    }
    if digital_flag.trim() == "Y" {
        types.push(VoucherType::Card);
        types.push(VoucherType::Mobile);
    }
    if types.is_empty() {
        types = vec![VoucherType::Card, VoucherType::Paper, VoucherType::Mobile];
    }
    types
}

/// Classify an item description into `(category, sub_category)`
pub fn categorize(items: &str) -> (String, String) {
    let item = items.trim().to_lowercase();
    if item.is_empty() {
        return (OTHER.to_string(), OTHER.to_string());
    }

    let contains_any = |keywords: &[&str]| keywords.iter().any(|k| item.contains(k));

    let (category, sub_category) = if contains_any(FOOD_KEYWORDS) {
        if item.contains("카페") || item.contains("커피") {
            ("음식점", "카페")
        } else if item.contains("빵") || item.contains("제과") || item.contains("베이커리") {
            ("음식점", "제과점")
        } else {
            ("음식점", "일반음식점")
        }
    } else if contains_any(GROCERY_KEYWORDS) {
        ("식료품", "슈퍼마켓")
    } else if contains_any(FASHION_KEYWORDS) {
        ("의류/패션", "의류")
    } else if contains_any(BEAUTY_KEYWORDS) {
        ("미용", "미용실")
    } else if contains_any(SERVICE_KEYWORDS) {
        ("서비스", "생활서비스")
    } else if item.contains("주유") || item.contains("충전") {
        ("주유소", "주유소")
    } else {
        return (OTHER.to_string(), truncate_chars(&item, 20));
    };

    (category.to_string(), sub_category.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_types() {
        assert_eq!(parse_types("Y", "N"), vec![VoucherType::Paper]);
        assert_eq!(
            parse_types("Y", "Y"),
            vec![VoucherType::Paper, VoucherType::Card, VoucherType::Mobile]
        );
        assert_eq!(
            parse_types("N", ""),
            vec![VoucherType::Card, VoucherType::Paper, VoucherType::Mobile]
        );
    }

    #[test]
    fn test_categorize_food_subkinds() {
        assert_eq!(categorize("커피 전문점"), ("음식점".to_string(), "카페".to_string()));
        assert_eq!(categorize("제과 제빵"), ("음식점".to_string(), "제과점".to_string()));
        assert_eq!(categorize("한식"), ("음식점".to_string(), "일반음식점".to_string()));
    }

    #[test]
    fn test_categorize_groups() {
        assert_eq!(categorize("정육점").0, "식료품");
        assert_eq!(categorize("신발 가게").0, "의류/패션");
        assert_eq!(categorize("헤어샵").0, "미용");
        assert_eq!(categorize("세탁소").1, "생활서비스");
        assert_eq!(categorize("주유소").0, "주유소");
    }

    #[test]
    fn test_categorize_fallback_truncates() {
        assert_eq!(categorize(""), (OTHER.to_string(), OTHER.to_string()));
        let (category, sub) = categorize("가구 및 인테리어 소품 전문 판매점 그리고 기타 잡화");
        assert_eq!(category, OTHER);
        assert_eq!(sub.chars().count(), 20);
    }
}
