//! Retry and back-off policy for platform workers.
//!
//! Errors are sorted into three reactions:
//!
//! | class | reaction |
//! |-------|----------|
//! | [`ErrorClass::Timeout`], [`ErrorClass::NetworkError`] | exponential back-off, retry the same page |
//! | [`ErrorClass::Blocked`], [`ErrorClass::RateLimited`] | one cooldown, then a single re-check |
//! | [`ErrorClass::ParseError`] | skip the page |
//!
//! Back-off schedule with `backoff_base = 1 000 ms`:
//!
//! | Retry | Sleep before it             |
//! |-------|-----------------------------|
//! | 1     | 1 000 ms × 2⁰ ± 25 % jitter |
//! | 2     | 1 000 ms × 2¹ ± 25 % jitter |
//! | 3     | 1 000 ms × 2² ± 25 % jitter |
//!
//! Delays are capped at `backoff_max` before jitter is applied.

use std::time::Duration;

use marketscan_core::{ErrorClass, ScanSettings};
use tokio_util::sync::CancellationToken;

use crate::error::AdapterError;

/// Upper bound honoured for a server-supplied `Retry-After`.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Sleep with exponential back-off and fetch the same page again.
    Backoff,
    /// Sleep for the block cooldown and re-check the same page once.
    Cooldown,
    /// Give up on this page but keep paginating.
    SkipPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub block_cooldown: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_settings(settings: &ScanSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            backoff_base: settings.backoff_base(),
            backoff_max: settings.backoff_max(),
            block_cooldown: settings.block_cooldown(),
        }
    }

    #[must_use]
    pub fn action(err: &AdapterError) -> RetryAction {
        match err.class() {
            ErrorClass::Timeout | ErrorClass::NetworkError => RetryAction::Backoff,
            ErrorClass::Blocked | ErrorClass::RateLimited => RetryAction::Cooldown,
            ErrorClass::ParseError => RetryAction::SkipPage,
        }
    }

    /// Jittered delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(20);
        let capped = self
            .backoff_base
            .saturating_mul(1u32 << exp)
            .min(self.backoff_max);
        let factor = rand::random::<f64>() * 0.5 + 0.75;
        Duration::try_from_secs_f64(capped.as_secs_f64() * factor).unwrap_or(capped)
    }

    /// Cooldown after a block: the configured cooldown, or `Retry-After` if
    /// the server asked for longer (capped at five minutes).
    #[must_use]
    pub fn cooldown_delay(&self, retry_after_secs: Option<u64>) -> Duration {
        let requested = retry_after_secs
            .map(Duration::from_secs)
            .unwrap_or_default()
            .min(MAX_RETRY_AFTER);
        self.block_cooldown.max(requested)
    }
}

/// Sleeps for `delay` unless `cancel` fires first.
///
/// Returns `false` if the sleep was cut short by cancellation.
pub(crate) async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(delay) => true,
    }
}
