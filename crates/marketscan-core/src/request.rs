use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::expression::KeywordExpr;
use crate::platform::Platform;

/// How plain keywords combine when filtering records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordMode {
    /// Every keyword must occur.
    #[default]
    All,
    /// At least one keyword must occur.
    Any,
}

impl std::str::FromStr for KeywordMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(KeywordMode::All),
            "any" => Ok(KeywordMode::Any),
            other => Err(format!("unknown keyword mode '{other}'; expected all or any")),
        }
    }
}

/// A validated scan request. Build one with [`ScanRequest::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    platforms: Vec<Platform>,
    keywords: Vec<String>,
    mode: KeywordMode,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    expression: Option<KeywordExpr>,
}

impl ScanRequest {
    #[must_use]
    pub fn builder() -> ScanRequestBuilder {
        ScanRequestBuilder::default()
    }

    /// Enabled platforms, in the order given, without duplicates.
    #[must_use]
    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Lowercased, deduplicated keywords.
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    #[must_use]
    pub fn mode(&self) -> KeywordMode {
        self.mode
    }

    #[must_use]
    pub fn min_price(&self) -> Option<Decimal> {
        self.min_price
    }

    #[must_use]
    pub fn max_price(&self) -> Option<Decimal> {
        self.max_price
    }

    #[must_use]
    pub fn expression(&self) -> Option<&KeywordExpr> {
        self.expression.as_ref()
    }

    /// Query string sent to marketplaces: keywords joined by a single space.
    #[must_use]
    pub fn search_query(&self) -> String {
        self.keywords.join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanRequestBuilder {
    platforms: Vec<Platform>,
    keywords: Vec<String>,
    mode: KeywordMode,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    expression: Option<String>,
}

impl ScanRequestBuilder {
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platforms.push(platform);
        self
    }

    #[must_use]
    pub fn platforms<I: IntoIterator<Item = Platform>>(mut self, platforms: I) -> Self {
        self.platforms.extend(platforms);
        self
    }

    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    #[must_use]
    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: KeywordMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn min_price(mut self, min: Option<Decimal>) -> Self {
        self.min_price = min;
        self
    }

    #[must_use]
    pub fn max_price(mut self, max: Option<Decimal>) -> Self {
        self.max_price = max;
        self
    }

    /// Filters with a boolean expression instead of plain keywords. The
    /// expression's terms replace any keywords set on the builder.
    #[must_use]
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Validates and freezes the request.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when no platform is enabled, a price bound
    /// is negative, `min > max`, or the expression does not parse.
    pub fn build(self) -> Result<ScanRequest, ValidationError> {
        let mut platforms = Vec::with_capacity(self.platforms.len());
        for platform in self.platforms {
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        if platforms.is_empty() {
            return Err(ValidationError::NoPlatforms);
        }

        for bound in [self.min_price, self.max_price].into_iter().flatten() {
            if bound.is_sign_negative() && !bound.is_zero() {
                return Err(ValidationError::NegativePrice(bound));
            }
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(ValidationError::InvalidPriceRange { min, max });
            }
        }

        let expression = self
            .expression
            .as_deref()
            .map(KeywordExpr::parse)
            .transpose()?;

        let keywords = match &expression {
            Some(expr) => expr.terms(),
            None => normalize_keywords(self.keywords),
        };

        Ok(ScanRequest {
            platforms,
            keywords,
            mode: self.mode,
            min_price: self.min_price,
            max_price: self.max_price,
            expression,
        })
    }
}

fn normalize_keywords(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for keyword in raw {
        let folded = keyword.trim().to_lowercase();
        if !folded.is_empty() && !out.contains(&folded) {
            out.push(folded);
        }
    }
    out
}
