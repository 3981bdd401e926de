use std::time::Duration;

use marketscan_core::{ErrorClass, RulesError, ValidationError};
use thiserror::Error;

/// Failure of a single page fetch or extraction.
///
/// These never escape a platform worker; they drive the retry policy and end
/// up as the `last_error` class of a `PlatformOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    /// A non-success status that is neither a server error nor a configured
    /// block status.
    #[error("unexpected HTTP {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("blocked: {0}")]
    Blocked(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl AdapterError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            AdapterError::Timeout(_) => ErrorClass::Timeout,
            AdapterError::Network(_) | AdapterError::UnexpectedStatus { .. } => {
                ErrorClass::NetworkError
            }
            AdapterError::RateLimited { .. } => ErrorClass::RateLimited,
            AdapterError::Blocked(_) => ErrorClass::Blocked,
            AdapterError::Parse(_) => ErrorClass::ParseError,
        }
    }

    pub(crate) fn from_transport(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout(timeout)
        } else {
            AdapterError::Network(err.to_string())
        }
    }
}

/// Errors that prevent a scan session from starting or finishing cleanly.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scan supervisor did not finish: {0}")]
    Join(String),
}
