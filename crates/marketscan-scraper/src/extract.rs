//! Compiles declarative [`PlatformRules`] into selectors and patterns, and
//! applies them to results pages.

use chrono::{DateTime, Utc};
use marketscan_core::{
    FieldRule, ListingRecord, Platform, PlatformRules, RulesError, SearchRules,
};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::adapter::ExtractedPage;
use crate::block::BlockDetector;
use crate::error::AdapterError;
use crate::price::parse_price;

/// Extraction rules for one platform, compiled once per session.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub(crate) platform: Platform,
    pub(crate) base_url: Url,
    pub(crate) currency: String,
    pub(crate) search: SearchRules,
    pub(crate) headers: HeaderMap,
    pub(crate) block: BlockDetector,
    containers: Vec<Selector>,
    title: FieldExtractor,
    link: FieldExtractor,
    price: Option<FieldExtractor>,
    description: Option<FieldExtractor>,
    item_id: Option<Regex>,
    next_page: Vec<Selector>,
}

#[derive(Debug, Clone)]
struct FieldExtractor {
    selectors: Vec<Selector>,
    attr: Option<String>,
    fallback: Option<Box<FieldExtractor>>,
}

impl FieldExtractor {
    fn compile(platform: Platform, field: &str, rule: &FieldRule) -> Result<Self, RulesError> {
        let fallback = rule
            .fallback
            .as_deref()
            .map(|fb| Self::compile(platform, field, fb).map(Box::new))
            .transpose()?;
        Ok(Self {
            selectors: compile_selectors(platform, field, &rule.selectors)?,
            attr: rule.attr.clone(),
            fallback,
        })
    }

    /// First non-empty value inside `scope`, trying fallbacks in order.
    fn read(&self, scope: ElementRef<'_>) -> Option<String> {
        for selector in &self.selectors {
            for element in scope.select(selector) {
                let value = match &self.attr {
                    Some(attr) => element.value().attr(attr).map(str::trim).map(str::to_owned),
                    None => Some(collapse_whitespace(element.text())),
                };
                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    return Some(value);
                }
            }
        }
        self.fallback.as_ref().and_then(|fb| fb.read(scope))
    }
}

impl CompiledRules {
    /// Compiles every selector, pattern, and header in `rules`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] naming the first selector, pattern, URL, or
    /// header that does not compile.
    pub fn compile(platform: Platform, rules: &PlatformRules) -> Result<Self, RulesError> {
        let invalid = |reason: String| RulesError::Invalid { platform, reason };

        let base_url = Url::parse(&rules.base_url)
            .map_err(|e| invalid(format!("base_url '{}': {e}", rules.base_url)))?;
        let sample = rules.search.url.replace("{query}", "sample");
        Url::parse(&sample)
            .map_err(|e| invalid(format!("search.url '{}': {e}", rules.search.url)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &rules.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| invalid(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| invalid(format!("header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let item_id = rules
            .listing
            .item_id
            .as_deref()
            .map(|pattern| {
                let re = Regex::new(pattern).map_err(|e| RulesError::InvalidPattern {
                    platform,
                    pattern: pattern.to_owned(),
                    reason: e.to_string(),
                })?;
                if re.captures_len() < 2 {
                    return Err(RulesError::InvalidPattern {
                        platform,
                        pattern: pattern.to_owned(),
                        reason: "pattern needs one capture group".to_owned(),
                    });
                }
                Ok(re)
            })
            .transpose()?;

        let listing = &rules.listing;
        Ok(Self {
            platform,
            base_url,
            currency: rules.currency.clone(),
            search: rules.search.clone(),
            headers,
            block: BlockDetector::new(&rules.block),
            containers: compile_selectors(platform, "listing.container", &listing.container)?,
            title: FieldExtractor::compile(platform, "listing.title", &listing.title)?,
            link: FieldExtractor::compile(platform, "listing.link", &listing.link)?,
            price: listing
                .price
                .as_ref()
                .map(|r| FieldExtractor::compile(platform, "listing.price", r))
                .transpose()?,
            description: listing
                .description
                .as_ref()
                .map(|r| FieldExtractor::compile(platform, "listing.description", r))
                .transpose()?,
            item_id,
            next_page: compile_selectors(platform, "next_page", &rules.next_page)?,
        })
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Extracts listing records from one results page.
    ///
    /// A page with no listing containers is an empty last page. Containers
    /// lacking a title or link are dropped; if every container is dropped the
    /// page is a parse failure.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Parse`] when containers were found but none
    /// yielded a record.
    pub fn extract(
        &self,
        html: &str,
        extracted_at: DateTime<Utc>,
    ) -> Result<ExtractedPage, AdapterError> {
        let document = Html::parse_document(html);

        let containers: Vec<ElementRef<'_>> = self
            .containers
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        if containers.is_empty() {
            return Ok(ExtractedPage {
                records: Vec::new(),
                has_more: false,
            });
        }

        let mut records = Vec::with_capacity(containers.len());
        for (index, container) in containers.iter().enumerate() {
            match self.record_from(*container, extracted_at) {
                Some(record) => records.push(record),
                None => tracing::debug!(
                    platform = %self.platform,
                    index,
                    "dropping listing container without title or link"
                ),
            }
        }

        if records.is_empty() {
            return Err(AdapterError::Parse(format!(
                "{} listing containers matched but none had a title and link",
                containers.len()
            )));
        }

        let has_more = if self.next_page.is_empty() {
            true
        } else {
            self.next_page
                .iter()
                .any(|sel| document.select(sel).next().is_some())
        };

        Ok(ExtractedPage { records, has_more })
    }

    fn record_from(
        &self,
        container: ElementRef<'_>,
        extracted_at: DateTime<Utc>,
    ) -> Option<ListingRecord> {
        let title = self.title.read(container)?;
        let href = self.link.read(container)?;
        let url = self.base_url.join(&href).ok()?;

        let price_text = self.price.as_ref().and_then(|p| p.read(container));
        let price = price_text.as_deref().and_then(parse_price);
        let description = self.description.as_ref().and_then(|d| d.read(container));

        Some(ListingRecord {
            platform: self.platform,
            item_id: self.item_id_for(&url),
            title,
            description,
            price,
            currency: Some(self.currency.clone()),
            price_text,
            url: url.to_string(),
            extracted_at,
            matched_keywords: Vec::new(),
        })
    }

    /// The rule's capture group on the link, or the link without query and fragment.
    fn item_id_for(&self, url: &Url) -> String {
        let captured = self.item_id.as_ref().and_then(|re| {
            re.captures(url.as_str())
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_owned())
        });
        captured.unwrap_or_else(|| {
            let mut bare = url.clone();
            bare.set_query(None);
            bare.set_fragment(None);
            bare.to_string()
        })
    }
}

fn compile_selectors(
    platform: Platform,
    field: &str,
    raw: &[String],
) -> Result<Vec<Selector>, RulesError> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            Selector::parse(s).map_err(|e| RulesError::InvalidSelector {
                platform,
                field: field.to_owned(),
                selector: s.to_owned(),
                reason: format!("{e:?}"),
            })
        })
        .collect()
}

fn collapse_whitespace<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
