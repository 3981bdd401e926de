//! One platform's fetch → filter → emit loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use marketscan_core::{
    ListingRecord, PlatformOutcome, PlatformState, ScanRequest, ScanSettings,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapter::{ExtractedPage, PageCursor, PlatformAdapter};
use crate::block::block_error;
use crate::error::AdapterError;
use crate::filter;
use crate::policy::{sleep_or_cancel, RetryAction, RetryPolicy};

#[derive(Debug, Clone)]
pub(crate) struct WorkerConfig {
    pub policy: RetryPolicy,
    pub max_pages: u32,
    pub inter_request_delay: Duration,
    pub fetch_timeout: Duration,
}

impl WorkerConfig {
    pub(crate) fn from_settings(settings: &ScanSettings) -> Self {
        Self {
            policy: RetryPolicy::from_settings(settings),
            max_pages: settings.max_pages,
            inter_request_delay: settings.inter_request_delay(),
            fetch_timeout: settings.request_timeout(),
        }
    }
}

/// How a page ended after the retry policy had its say.
enum PageFetch {
    Page(ExtractedPage),
    /// Given up on; `fetched` is whether the server answered at all.
    Skipped { fetched: bool },
    Terminal(PlatformState),
}

pub(crate) struct PlatformWorker {
    pub adapter: Arc<dyn PlatformAdapter>,
    pub request: Arc<ScanRequest>,
    pub tx: mpsc::Sender<ListingRecord>,
    pub cancel: CancellationToken,
    pub config: WorkerConfig,
}

impl PlatformWorker {
    pub(crate) async fn run(self) -> PlatformOutcome {
        let platform = self.adapter.platform();
        let mut outcome = PlatformOutcome::new(platform);
        let mut seen: HashSet<String> = HashSet::new();
        let mut cursor = PageCursor::first();
        let mut previous_page_ok = false;

        tracing::info!(
            platform = %platform,
            query = %self.request.search_query(),
            "platform scan started"
        );

        let state = 'pages: loop {
            if self.cancel.is_cancelled() {
                break PlatformState::Cancelled;
            }
            if cursor.index() >= self.config.max_pages {
                tracing::debug!(
                    platform = %platform,
                    max_pages = self.config.max_pages,
                    "page cap reached"
                );
                break PlatformState::Exhausted;
            }
            if cursor.index() > 0
                && !sleep_or_cancel(self.config.inter_request_delay, &self.cancel).await
            {
                break PlatformState::Cancelled;
            }

            match self.fetch_with_policy(cursor, previous_page_ok, &mut outcome).await {
                PageFetch::Page(page) => {
                    previous_page_ok = true;
                    let has_more = page.has_more;
                    for mut record in page.records {
                        if !filter::accepts(&self.request, &record) {
                            continue;
                        }
                        if !seen.insert(record.item_id.clone()) {
                            continue;
                        }
                        record.matched_keywords = filter::matched_keywords(&self.request, &record);
                        if !self.emit(record).await {
                            break 'pages PlatformState::Cancelled;
                        }
                        outcome.records_emitted += 1;
                    }
                    if !has_more {
                        break PlatformState::Exhausted;
                    }
                }
                PageFetch::Skipped { fetched } => previous_page_ok = fetched,
                PageFetch::Terminal(state) => break state,
            }

            cursor = cursor.next();
        };

        outcome.state = state;
        tracing::info!(
            platform = %platform,
            state = ?outcome.state,
            records = outcome.records_emitted,
            pages = outcome.pages_fetched,
            retries = outcome.retries,
            "platform scan finished: {}",
            outcome.summary()
        );
        outcome
    }

    /// Sends one record, waiting for channel capacity. Returns `false` if the
    /// session was cancelled or the consumer went away.
    async fn emit(&self, record: ListingRecord) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            sent = self.tx.send(record) => {
                if sent.is_err() {
                    tracing::debug!(platform = %self.adapter.platform(), "record stream dropped");
                    self.cancel.cancel();
                }
                sent.is_ok()
            }
        }
    }

    /// Fetches and extracts one page, applying the retry policy to failures.
    async fn fetch_with_policy(
        &self,
        cursor: PageCursor,
        previous_page_ok: bool,
        outcome: &mut PlatformOutcome,
    ) -> PageFetch {
        let platform = self.adapter.platform();
        let policy = &self.config.policy;
        let mut backoff_retries = 0u32;
        let mut cooled_down = false;

        loop {
            if self.cancel.is_cancelled() {
                return PageFetch::Terminal(PlatformState::Cancelled);
            }

            let err = match self.fetch_once(cursor, outcome).await {
                Ok(page) => return PageFetch::Page(page),
                Err(err) => err,
            };
            outcome.last_error = Some(err.class());

            match RetryPolicy::action(&err) {
                RetryAction::SkipPage => {
                    outcome.parse_errors += 1;
                    outcome.pages_skipped += 1;
                    tracing::warn!(
                        platform = %platform,
                        page = %cursor,
                        error = %err,
                        "skipping unparseable page"
                    );
                    return PageFetch::Skipped { fetched: true };
                }
                RetryAction::Backoff => {
                    if backoff_retries >= policy.max_retries {
                        if previous_page_ok {
                            outcome.pages_skipped += 1;
                            tracing::warn!(
                                platform = %platform,
                                page = %cursor,
                                retries = backoff_retries,
                                error = %err,
                                "retries exhausted, skipping page"
                            );
                            return PageFetch::Skipped { fetched: false };
                        }
                        tracing::error!(
                            platform = %platform,
                            page = %cursor,
                            retries = backoff_retries,
                            error = %err,
                            "retries exhausted"
                        );
                        return PageFetch::Terminal(PlatformState::Errored);
                    }

                    let attempt = backoff_retries + 1;
                    let delay = policy.backoff_delay(attempt);
                    tracing::warn!(
                        platform = %platform,
                        page = %cursor,
                        attempt,
                        max_retries = policy.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient fetch error, retrying after backoff"
                    );
                    if !sleep_or_cancel(delay, &self.cancel).await {
                        return PageFetch::Terminal(PlatformState::Cancelled);
                    }
                    backoff_retries = attempt;
                    outcome.retries += 1;
                }
                RetryAction::Cooldown => {
                    if cooled_down {
                        tracing::warn!(
                            platform = %platform,
                            page = %cursor,
                            error = %err,
                            "still blocked after cooldown"
                        );
                        return PageFetch::Terminal(PlatformState::Blocked);
                    }
                    let retry_after = match &err {
                        AdapterError::RateLimited { retry_after_secs } => *retry_after_secs,
                        _ => None,
                    };
                    let delay = policy.cooldown_delay(retry_after);
                    tracing::warn!(
                        platform = %platform,
                        page = %cursor,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "blocked, cooling down before one re-check"
                    );
                    if !sleep_or_cancel(delay, &self.cancel).await {
                        return PageFetch::Terminal(PlatformState::Cancelled);
                    }
                    cooled_down = true;
                    outcome.retries += 1;
                }
            }
        }
    }

    /// One fetch under the worker's own deadline, then block check and extraction.
    ///
    /// `pages_fetched` counts every page the server answered, blocked or not.
    async fn fetch_once(
        &self,
        cursor: PageCursor,
        outcome: &mut PlatformOutcome,
    ) -> Result<ExtractedPage, AdapterError> {
        let fetch = self.adapter.fetch_page(&self.request, cursor);
        let page = tokio::time::timeout(self.config.fetch_timeout, fetch)
            .await
            .map_err(|_| AdapterError::Timeout(self.config.fetch_timeout))??;
        outcome.pages_fetched += 1;

        if self.adapter.detect_block(&page) {
            return Err(block_error(
                &page,
                format!("HTTP {} from {}", page.status, page.url),
            ));
        }
        self.adapter.extract_records(&page)
    }
}
