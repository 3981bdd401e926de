//! Rule-driven HTTP adapter shared by every marketplace.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use marketscan_core::{Platform, PlatformRules, ScanRequest, ScanSettings};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Url};

use super::{ExtractedPage, PageCursor, PlatformAdapter, RawPage};
use crate::error::{AdapterError, ScanError};
use crate::extract::CompiledRules;

/// Characters left as-is when a query is embedded in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches search results over HTTP and extracts them with compiled rules.
///
/// One instance per platform per session. Clones of the underlying
/// `reqwest::Client` share a connection pool.
pub struct HttpAdapter {
    rules: Arc<CompiledRules>,
    client: Client,
    timeout: Duration,
}

impl HttpAdapter {
    #[must_use]
    pub fn new(rules: Arc<CompiledRules>, client: Client, timeout: Duration) -> Self {
        Self {
            rules,
            client,
            timeout,
        }
    }

    /// Compiles `rules` and builds a dedicated client from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Rules`] if the rules do not compile and
    /// [`ScanError::Http`] if the client cannot be constructed.
    pub fn from_rules(
        platform: Platform,
        rules: &PlatformRules,
        settings: &ScanSettings,
    ) -> Result<Self, ScanError> {
        let compiled = CompiledRules::compile(platform, rules)?;
        let client = Self::build_client(settings)?;
        Ok(Self::new(
            Arc::new(compiled),
            client,
            settings.request_timeout(),
        ))
    }

    /// Builds a `reqwest::Client` with the configured timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the client cannot be constructed
    /// (e.g., invalid TLS config).
    pub fn build_client(settings: &ScanSettings) -> Result<Client, reqwest::Error> {
        let timeout = settings.request_timeout();
        Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
            .user_agent(settings.user_agent.as_str())
            .build()
    }

    /// Builds the search URL for `request` at `cursor`.
    ///
    /// The joined keywords either replace a `{query}` placeholder
    /// (percent-encoded as a path segment) or go into `query_param`. The page
    /// parameter is omitted for the first page.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Network`] if the resulting URL does not parse.
    pub fn search_url(
        &self,
        request: &ScanRequest,
        cursor: PageCursor,
    ) -> Result<Url, AdapterError> {
        let search = &self.rules.search;
        let joined = request.keywords().join(&search.keyword_separator);

        let raw = if search.url.contains("{query}") {
            let encoded = utf8_percent_encode(&joined, PATH_SEGMENT).to_string();
            search.url.replace("{query}", &encoded)
        } else {
            search.url.clone()
        };
        let mut url = Url::parse(&raw)
            .map_err(|e| AdapterError::Network(format!("invalid search URL '{raw}': {e}")))?;

        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(param) = &search.query_param {
            pairs.push((param.as_str(), joined.clone()));
        }
        if let (Some(param), Some(min)) = (&search.price_min_param, request.min_price()) {
            pairs.push((param.as_str(), min.normalize().to_string()));
        }
        if let (Some(param), Some(max)) = (&search.price_max_param, request.max_price()) {
            pairs.push((param.as_str(), max.normalize().to_string()));
        }
        if let Some(param) = &search.page_param {
            if cursor.index() > 0 {
                let page = search.first_page.saturating_add(cursor.index());
                pairs.push((param.as_str(), page.to_string()));
            }
        }

        if !pairs.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(pairs.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }
}

#[async_trait]
impl PlatformAdapter for HttpAdapter {
    fn platform(&self) -> Platform {
        self.rules.platform()
    }

    async fn fetch_page(
        &self,
        request: &ScanRequest,
        cursor: PageCursor,
    ) -> Result<RawPage, AdapterError> {
        let url = self.search_url(request, cursor)?;
        tracing::debug!(
            platform = %self.platform(),
            page = %cursor,
            url = %url,
            "fetching results page"
        );

        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::REFERER, self.rules.base_url.as_str())
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .headers(self.rules.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AdapterError::from_transport(&e, self.timeout))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AdapterError::Network(format!(
                "HTTP {} from {}",
                status.as_u16(),
                response.url()
            )));
        }

        if !status.is_success() && !self.rules.block.is_block_status(status.as_u16()) {
            return Err(AdapterError::UnexpectedStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let final_url = response.url().to_string();

        let body = response
            .text()
            .await
            .map_err(|e| AdapterError::from_transport(&e, self.timeout))?;

        Ok(RawPage {
            status: status.as_u16(),
            url: final_url,
            body,
            retry_after_secs,
        })
    }

    fn detect_block(&self, page: &RawPage) -> bool {
        match self.rules.block.check(page) {
            Some(reason) => {
                tracing::debug!(
                    platform = %self.platform(),
                    %reason,
                    url = %page.url,
                    "block detected"
                );
                true
            }
            None => false,
        }
    }

    fn extract_records(&self, page: &RawPage) -> Result<ExtractedPage, AdapterError> {
        let mut extracted = self.rules.extract(&page.body, Utc::now())?;
        // Without a page parameter every cursor would fetch the same page.
        if self.rules.search.page_param.is_none() {
            extracted.has_more = false;
        }
        Ok(extracted)
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
