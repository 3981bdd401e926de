//! The per-platform adapter seam: fetch a page, judge whether it is a block,
//! and extract listing records from it.

mod http;

use async_trait::async_trait;
use marketscan_core::{ListingRecord, Platform, ScanRequest};

use crate::error::AdapterError;

pub use http::HttpAdapter;

/// A fetched results page, before block detection or extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    pub body: String,
    pub retry_after_secs: Option<u64>,
}

/// Zero-based position in a platform's result pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageCursor(u32);

impl PageCursor {
    #[must_use]
    pub fn first() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn at(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> u32 {
        self.0
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for PageCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.saturating_add(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub records: Vec<ListingRecord>,
    pub has_more: bool,
}

/// One marketplace's fetch and extraction behaviour.
///
/// Implementations are used from a single worker task, but must be `Send +
/// Sync` so the orchestrator can hold them behind an `Arc`.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Fetches one results page for `request` at `cursor`.
    ///
    /// Success and block statuses come back as a [`RawPage`]; judging them is
    /// left to [`Self::detect_block`] and [`Self::extract_records`].
    ///
    /// # Errors
    ///
    /// [`AdapterError::Timeout`] when the request exceeds its deadline,
    /// [`AdapterError::Network`] for transport failures and 5xx responses,
    /// [`AdapterError::UnexpectedStatus`] for any other non-success status.
    async fn fetch_page(
        &self,
        request: &ScanRequest,
        cursor: PageCursor,
    ) -> Result<RawPage, AdapterError>;

    fn detect_block(&self, page: &RawPage) -> bool;

    /// # Errors
    ///
    /// [`AdapterError::Parse`] when the page cannot yield any record.
    fn extract_records(&self, page: &RawPage) -> Result<ExtractedPage, AdapterError>;
}
