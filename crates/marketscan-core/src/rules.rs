//! Declarative extraction rules: how to query a marketplace and where the
//! listing fields live in its results markup.
//!
//! Rules are plain data. `marketscan-scraper` compiles them into selectors and
//! regexes; this module only owns the schema, loading, and structural checks.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RulesError};
use crate::platform::Platform;

const BUNDLED_RULES: &str = include_str!("../config/platforms.yaml");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesFile {
    pub platforms: BTreeMap<Platform, PlatformRules>,
}

impl RulesFile {
    #[must_use]
    pub fn get(&self, platform: Platform) -> Option<&PlatformRules> {
        self.platforms.get(&platform)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRules {
    /// Origin used to resolve relative listing links.
    pub base_url: String,
    pub currency: String,
    pub search: SearchRules,
    pub listing: ListingRules,
    /// Presence of any of these marks a page as having a successor.
    #[serde(default)]
    pub next_page: Vec<String>,
    #[serde(default)]
    pub block: BlockRules,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRules {
    /// Search endpoint. May embed the query as `{query}`.
    pub url: String,
    #[serde(default)]
    pub query_param: Option<String>,
    #[serde(default = "default_keyword_separator")]
    pub keyword_separator: String,
    #[serde(default)]
    pub price_min_param: Option<String>,
    #[serde(default)]
    pub price_max_param: Option<String>,
    #[serde(default)]
    pub page_param: Option<String>,
    #[serde(default = "default_first_page")]
    pub first_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRules {
    /// Candidate container selectors; the first one that matches anything wins.
    pub container: Vec<String>,
    pub title: FieldRule,
    pub link: FieldRule,
    #[serde(default)]
    pub price: Option<FieldRule>,
    #[serde(default)]
    pub description: Option<FieldRule>,
    /// Regex with one capture group applied to the resolved link.
    #[serde(default)]
    pub item_id: Option<String>,
}

/// Where to read one field inside a listing container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub selectors: Vec<String>,
    /// Read this attribute instead of the element text.
    #[serde(default)]
    pub attr: Option<String>,
    #[serde(default)]
    pub fallback: Option<Box<FieldRule>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRules {
    #[serde(default = "default_block_statuses")]
    pub statuses: Vec<u16>,
    /// Case-insensitive body substrings that indicate a challenge page.
    #[serde(default = "default_block_markers")]
    pub markers: Vec<String>,
}

impl Default for BlockRules {
    fn default() -> Self {
        Self {
            statuses: default_block_statuses(),
            markers: default_block_markers(),
        }
    }
}

fn default_keyword_separator() -> String {
    " ".to_string()
}

fn default_first_page() -> u32 {
    1
}

fn default_block_statuses() -> Vec<u16> {
    vec![403, 429]
}

fn default_block_markers() -> Vec<String> {
    ["captcha", "cf-browser-verification", "challenge-running"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Load and validate rules from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_rules(path: &Path) -> Result<RulesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::RulesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_rules(&content)
}

/// The rules shipped with the binary for allegro, olx, and vinted.
///
/// # Errors
///
/// Returns `ConfigError` only if the embedded file is malformed.
pub fn bundled_rules() -> Result<RulesFile, ConfigError> {
    parse_rules(BUNDLED_RULES)
}

/// Parse and validate rules from YAML text.
///
/// # Errors
///
/// Returns `ConfigError::RulesFileParse` for malformed YAML and
/// `ConfigError::Rules` for structurally incomplete rules.
pub fn parse_rules(content: &str) -> Result<RulesFile, ConfigError> {
    let rules: RulesFile = serde_yaml::from_str(content)?;
    validate_rules(&rules)?;
    Ok(rules)
}

fn validate_rules(rules: &RulesFile) -> Result<(), RulesError> {
    for (&platform, r) in &rules.platforms {
        let invalid = |reason: String| RulesError::Invalid { platform, reason };

        if !(r.base_url.starts_with("http://") || r.base_url.starts_with("https://")) {
            return Err(invalid(format!(
                "base_url must be an absolute http(s) URL, got '{}'",
                r.base_url
            )));
        }
        if r.currency.trim().is_empty() {
            return Err(invalid("currency must be non-empty".to_string()));
        }
        if r.search.url.trim().is_empty() {
            return Err(invalid("search.url must be non-empty".to_string()));
        }
        if r.search.query_param.is_none() && !r.search.url.contains("{query}") {
            return Err(invalid(
                "search needs either query_param or a {query} placeholder in url".to_string(),
            ));
        }
        if r.listing.container.iter().all(|s| s.trim().is_empty()) {
            return Err(invalid("listing.container needs at least one selector".to_string()));
        }

        let mut fields = vec![("title", &r.listing.title), ("link", &r.listing.link)];
        if let Some(price) = &r.listing.price {
            fields.push(("price", price));
        }
        if let Some(description) = &r.listing.description {
            fields.push(("description", description));
        }
        for (name, field) in fields {
            if !field_has_selectors(field) {
                return Err(invalid(format!(
                    "listing.{name} needs at least one selector at every level"
                )));
            }
        }

        if r.block.statuses.iter().any(|s| !(100..=599).contains(s)) {
            return Err(invalid("block.statuses must be HTTP status codes".to_string()));
        }
    }
    Ok(())
}

fn field_has_selectors(field: &FieldRule) -> bool {
    field.selectors.iter().any(|s| !s.trim().is_empty())
        && field.fallback.as_deref().is_none_or(field_has_selectors)
}

#[cfg(test)]
#[path = "rules_test.rs"]
mod tests;
