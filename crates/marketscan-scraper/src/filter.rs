//! Pure record filters applied by platform workers before emitting.

use marketscan_core::{KeywordMode, ListingRecord, ScanRequest};
use rust_decimal::Decimal;

/// Keyword test over the record's case-folded title and description.
///
/// Keywords must already be lowercase (as `ScanRequest` stores them). An empty
/// keyword list matches every record.
#[must_use]
pub fn matches(record: &ListingRecord, keywords: &[String], mode: KeywordMode) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let text = record.search_text();
    match mode {
        KeywordMode::All => keywords.iter().all(|k| text.contains(k.as_str())),
        KeywordMode::Any => keywords.iter().any(|k| text.contains(k.as_str())),
    }
}

/// Inclusive price-range test. A record without a price passes only when no
/// bound is set.
#[must_use]
pub fn in_range(record: &ListingRecord, min: Option<Decimal>, max: Option<Decimal>) -> bool {
    match record.price {
        None => min.is_none() && max.is_none(),
        Some(price) => {
            min.is_none_or(|min| price >= min) && max.is_none_or(|max| price <= max)
        }
    }
}

/// Full request-level acceptance: expression (or keywords) then price.
#[must_use]
pub fn accepts(request: &ScanRequest, record: &ListingRecord) -> bool {
    let keyword_ok = match request.expression() {
        Some(expr) => expr.evaluate_folded(&record.search_text()),
        None => matches(record, request.keywords(), request.mode()),
    };
    keyword_ok && in_range(record, request.min_price(), request.max_price())
}

/// The request's keywords (or expression terms) present in the record's text,
/// in request order.
#[must_use]
pub fn matched_keywords(request: &ScanRequest, record: &ListingRecord) -> Vec<String> {
    let text = record.search_text();
    match request.expression() {
        Some(expr) => expr.matched_terms(&text),
        None => request
            .keywords()
            .iter()
            .filter(|k| text.contains(k.as_str()))
            .cloned()
            .collect(),
    }
}
