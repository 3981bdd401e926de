use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::platform::Platform;

/// One marketplace listing as extracted from a results page.
///
/// Identity is `(platform, item_id)`; the orchestrator never emits the same
/// pair twice within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub platform: Platform,
    pub item_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    /// ISO 4217 code, e.g. `"PLN"`.
    pub currency: Option<String>,
    /// Price exactly as rendered on the page, before parsing.
    pub price_text: Option<String>,
    pub url: String,
    pub extracted_at: DateTime<Utc>,
    /// Request keywords found in the title or description. Empty until the
    /// record passes the session's filters.
    #[serde(default)]
    pub matched_keywords: Vec<String>,
}

impl ListingRecord {
    /// Title and description, lowercased and space-joined, for keyword matching.
    #[must_use]
    pub fn search_text(&self) -> String {
        match &self.description {
            Some(desc) if !desc.is_empty() => format!("{} {}", self.title, desc).to_lowercase(),
            _ => self.title.to_lowercase(),
        }
    }

    /// `"1299.50 PLN"`, the raw price text when unparsed, or `"-"`.
    #[must_use]
    pub fn price_label(&self) -> String {
        match (&self.price, &self.currency, &self.price_text) {
            (Some(price), Some(currency), _) => format!("{price} {currency}"),
            (Some(price), None, _) => price.to_string(),
            (None, _, Some(text)) if !text.trim().is_empty() => text.trim().to_owned(),
            _ => "-".to_owned(),
        }
    }
}
