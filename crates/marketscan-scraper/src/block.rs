//! Recognising anti-bot responses before extraction is attempted.

use marketscan_core::BlockRules;

use crate::adapter::RawPage;
use crate::error::AdapterError;

const TOO_MANY_REQUESTS: u16 = 429;

/// Block rules with markers pre-lowercased for matching.
#[derive(Debug, Clone)]
pub(crate) struct BlockDetector {
    statuses: Vec<u16>,
    markers: Vec<String>,
}

impl BlockDetector {
    pub(crate) fn new(rules: &BlockRules) -> Self {
        Self {
            statuses: rules.statuses.clone(),
            markers: rules
                .markers
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    pub(crate) fn is_block_status(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }

    /// Returns the matched reason if the page looks like a block or challenge.
    pub(crate) fn check(&self, page: &RawPage) -> Option<String> {
        if self.is_block_status(page.status) {
            return Some(format!("HTTP {}", page.status));
        }
        if self.markers.is_empty() {
            return None;
        }
        let body = page.body.to_lowercase();
        self.markers
            .iter()
            .find(|m| body.contains(m.as_str()))
            .map(|m| format!("body marker '{m}'"))
    }
}

/// Classifies a page already judged as blocked.
///
/// A 429 becomes [`AdapterError::RateLimited`] carrying any `Retry-After`;
/// everything else is [`AdapterError::Blocked`].
#[must_use]
pub fn block_error(page: &RawPage, reason: impl Into<String>) -> AdapterError {
    if page.status == TOO_MANY_REQUESTS {
        AdapterError::RateLimited {
            retry_after_secs: page.retry_after_secs,
        }
    } else {
        AdapterError::Blocked(reason.into())
    }
}
