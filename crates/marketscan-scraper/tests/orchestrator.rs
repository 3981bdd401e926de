//! Session-level behaviour of `Scanner` driven by scripted in-memory adapters.
//!
//! No network: each adapter replays a fixed list of page outcomes and counts
//! how often it was asked for a page.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use marketscan_core::{
    ErrorClass, ListingRecord, Platform, PlatformState, RulesFile, ScanRequest, ScanSettings,
    SessionState,
};
use marketscan_scraper::{
    AdapterError, ExtractedPage, PageCursor, PlatformAdapter, RawPage, Scanner,
};
use rust_decimal::Decimal;

/// One scripted answer to `fetch_page`.
enum Step {
    Page(Vec<ListingRecord>, bool),
    Fail(AdapterError),
    Block,
    Unparseable,
    Panic,
}

struct ScriptedAdapter {
    platform: Platform,
    steps: Mutex<VecDeque<Step>>,
    pages: Mutex<HashMap<String, ExtractedPage>>,
    /// Once the script runs out, keep serving fresh single-record pages.
    endless: bool,
    fetches: AtomicU32,
}

impl ScriptedAdapter {
    fn new(platform: Platform, steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            platform,
            steps: Mutex::new(steps.into()),
            pages: Mutex::new(HashMap::new()),
            endless: false,
            fetches: AtomicU32::new(0),
        })
    }

    fn endless(platform: Platform) -> Arc<Self> {
        Arc::new(Self {
            platform,
            steps: Mutex::new(VecDeque::new()),
            pages: Mutex::new(HashMap::new()),
            endless: true,
            fetches: AtomicU32::new(0),
        })
    }

    fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    fn page(status: u16, body: String) -> RawPage {
        RawPage {
            status,
            url: "https://marketplace.test/search".to_owned(),
            body,
            retry_after_secs: None,
        }
    }
}

#[async_trait]
impl PlatformAdapter for ScriptedAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_page(
        &self,
        _request: &ScanRequest,
        cursor: PageCursor,
    ) -> Result<RawPage, AdapterError> {
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        let step = match step {
            Some(step) => step,
            None if self.endless => Step::Page(
                vec![record(self.platform, &format!("e{n}"), "laptop", Some("100"))],
                true,
            ),
            None => Step::Page(Vec::new(), false),
        };

        match step {
            Step::Page(records, has_more) => {
                let key = format!("page-{n}-{cursor}");
                self.pages
                    .lock()
                    .unwrap()
                    .insert(key.clone(), ExtractedPage { records, has_more });
                Ok(Self::page(200, key))
            }
            Step::Fail(err) => Err(err),
            Step::Block => Ok(Self::page(403, "captcha".to_owned())),
            Step::Unparseable => Ok(Self::page(200, "<html>changed layout</html>".to_owned())),
            Step::Panic => panic!("scripted adapter panic"),
        }
    }

    fn detect_block(&self, page: &RawPage) -> bool {
        page.status == 403 || page.status == 429
    }

    fn extract_records(&self, page: &RawPage) -> Result<ExtractedPage, AdapterError> {
        self.pages
            .lock()
            .unwrap()
            .remove(&page.body)
            .ok_or_else(|| AdapterError::Parse("no listing containers".to_owned()))
    }
}

fn record(platform: Platform, id: &str, title: &str, price: Option<&str>) -> ListingRecord {
    ListingRecord {
        platform,
        item_id: id.to_owned(),
        title: title.to_owned(),
        description: None,
        price: price.map(|p| p.parse::<Decimal>().unwrap()),
        currency: Some("PLN".to_owned()),
        price_text: price.map(|p| format!("{p} zł")),
        url: format!("https://marketplace.test/items/{id}"),
        extracted_at: Utc::now(),
        matched_keywords: Vec::new(),
    }
}

fn laptops(platform: Platform, ids: &[&str]) -> Vec<ListingRecord> {
    ids.iter()
        .map(|id| record(platform, id, "Gaming laptop", Some("2500")))
        .collect()
}

/// No delays anywhere, three retries, generous page cap.
fn test_settings() -> ScanSettings {
    ScanSettings {
        request_timeout_secs: 5,
        user_agent: "marketscan-test/0.1".to_owned(),
        max_retries: 3,
        retry_backoff_base_ms: 0,
        retry_backoff_max_ms: 0,
        block_cooldown_secs: 0,
        max_pages: 1_000,
        inter_request_delay_ms: 0,
        channel_capacity: 16,
    }
}

fn scanner(settings: ScanSettings) -> Scanner {
    Scanner::new(settings, &RulesFile::default()).expect("scanner builds")
}

fn request(platforms: &[Platform]) -> ScanRequest {
    ScanRequest::builder()
        .platforms(platforms.iter().copied())
        .keyword("laptop")
        .build()
        .unwrap()
}

fn adapters<const N: usize>(list: [Arc<ScriptedAdapter>; N]) -> Vec<Arc<dyn PlatformAdapter>> {
    list.into_iter()
        .map(|a| a as Arc<dyn PlatformAdapter>)
        .collect()
}

// ---------------------------------------------------------------------------
// isolation between platforms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blocked_platform_does_not_stop_the_others() {
    let allegro = ScriptedAdapter::new(Platform::Allegro, vec![Step::Block, Step::Block]);
    let olx = ScriptedAdapter::new(
        Platform::Olx,
        vec![
            Step::Page(laptops(Platform::Olx, &["o1", "o2"]), true),
            Step::Page(laptops(Platform::Olx, &["o3"]), false),
        ],
    );

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(
            request(&[Platform::Allegro, Platform::Olx]),
            adapters([allegro.clone(), olx]),
        )
        .unwrap();

    let records: Vec<ListingRecord> = stream.collect().await;
    let summary = handle.wait().await.unwrap();

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.platform == Platform::Olx));
    assert_eq!(summary.state, SessionState::Completed);
    assert_eq!(summary.total_records, 3);

    let blocked = summary.outcome(Platform::Allegro).unwrap();
    assert_eq!(blocked.state, PlatformState::Blocked);
    assert_eq!(blocked.retries, 1, "one re-check after cooldown");
    assert_eq!(blocked.last_error, Some(ErrorClass::Blocked));
    assert_eq!(allegro.fetches(), 2);
    assert_eq!(blocked.pages_fetched, 2);

    let ok = summary.outcome(Platform::Olx).unwrap();
    assert_eq!(ok.state, PlatformState::Exhausted);
    assert_eq!(ok.records_emitted, 3);
    assert_eq!(ok.pages_fetched, 2);
}

#[tokio::test]
async fn panicking_worker_is_reported_as_errored() {
    let allegro = ScriptedAdapter::new(Platform::Allegro, vec![Step::Panic]);
    let vinted = ScriptedAdapter::new(
        Platform::Vinted,
        vec![Step::Page(laptops(Platform::Vinted, &["v1"]), false)],
    );

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(
            request(&[Platform::Allegro, Platform::Vinted]),
            adapters([allegro, vinted]),
        )
        .unwrap();

    let records: Vec<ListingRecord> = stream.collect().await;
    let summary = handle.wait().await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(
        summary.outcome(Platform::Allegro).unwrap().state,
        PlatformState::Errored
    );
    assert_eq!(
        summary.outcome(Platform::Vinted).unwrap().state,
        PlatformState::Exhausted
    );
    assert_eq!(summary.state, SessionState::Completed);
}

// ---------------------------------------------------------------------------
// retry policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_errors_retry_exactly_max_retries_times() {
    let steps = (0..10)
        .map(|_| Step::Fail(AdapterError::Network("connection reset".to_owned())))
        .collect();
    let allegro = ScriptedAdapter::new(Platform::Allegro, steps);

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(request(&[Platform::Allegro]), adapters([allegro.clone()]))
        .unwrap();
    drop(stream.collect::<Vec<_>>().await);
    let summary = handle.wait().await.unwrap();

    let outcome = summary.outcome(Platform::Allegro).unwrap();
    assert_eq!(outcome.state, PlatformState::Errored);
    assert_eq!(outcome.retries, 3);
    assert_eq!(outcome.last_error, Some(ErrorClass::NetworkError));
    assert_eq!(allegro.fetches(), 4, "first attempt plus three retries");
    assert_eq!(outcome.summary(), "error after 3 retries, 0 found");
}

#[tokio::test]
async fn every_platform_errored_fails_the_session() {
    let fail = |p| {
        ScriptedAdapter::new(
            p,
            (0..4)
                .map(|_| Step::Fail(AdapterError::Timeout(Duration::from_secs(5))))
                .collect(),
        )
    };

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(
            request(&[Platform::Allegro, Platform::Olx]),
            adapters([fail(Platform::Allegro), fail(Platform::Olx)]),
        )
        .unwrap();
    drop(stream.collect::<Vec<_>>().await);
    let summary = handle.wait().await.unwrap();

    assert_eq!(summary.state, SessionState::Failed);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.state == PlatformState::Errored && o.last_error == Some(ErrorClass::Timeout)));
}

#[tokio::test]
async fn transient_error_recovers_within_budget() {
    let allegro = ScriptedAdapter::new(
        Platform::Allegro,
        vec![
            Step::Fail(AdapterError::Network("reset".to_owned())),
            Step::Fail(AdapterError::Timeout(Duration::from_secs(5))),
            Step::Page(laptops(Platform::Allegro, &["a1"]), false),
        ],
    );

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(request(&[Platform::Allegro]), adapters([allegro]))
        .unwrap();
    let records: Vec<ListingRecord> = stream.collect().await;
    let summary = handle.wait().await.unwrap();

    let outcome = summary.outcome(Platform::Allegro).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(outcome.state, PlatformState::Exhausted);
    assert_eq!(outcome.retries, 2);
}

#[tokio::test]
async fn exhausted_retries_after_a_good_page_skip_ahead() {
    let mut steps = vec![Step::Page(laptops(Platform::Olx, &["o1"]), true)];
    steps.extend((0..4).map(|_| Step::Fail(AdapterError::Network("reset".to_owned()))));
    steps.push(Step::Page(laptops(Platform::Olx, &["o2"]), false));
    let olx = ScriptedAdapter::new(Platform::Olx, steps);

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(request(&[Platform::Olx]), adapters([olx]))
        .unwrap();
    let records: Vec<ListingRecord> = stream.collect().await;
    let summary = handle.wait().await.unwrap();

    let outcome = summary.outcome(Platform::Olx).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(outcome.state, PlatformState::Exhausted);
    assert_eq!(outcome.retries, 3);
    assert_eq!(outcome.pages_skipped, 1);
}

#[tokio::test]
async fn rate_limit_cools_down_then_resumes() {
    let olx = ScriptedAdapter::new(
        Platform::Olx,
        vec![
            Step::Fail(AdapterError::RateLimited {
                retry_after_secs: Some(0),
            }),
            Step::Page(laptops(Platform::Olx, &["o1"]), false),
        ],
    );

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(request(&[Platform::Olx]), adapters([olx]))
        .unwrap();
    let records: Vec<ListingRecord> = stream.collect().await;
    let summary = handle.wait().await.unwrap();

    let outcome = summary.outcome(Platform::Olx).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(outcome.state, PlatformState::Exhausted);
    assert_eq!(outcome.retries, 1);
}

#[tokio::test]
async fn still_rate_limited_after_cooldown_ends_blocked() {
    let allegro = ScriptedAdapter::new(
        Platform::Allegro,
        vec![
            Step::Fail(AdapterError::RateLimited {
                retry_after_secs: Some(0),
            }),
            Step::Fail(AdapterError::RateLimited {
                retry_after_secs: None,
            }),
            Step::Page(laptops(Platform::Allegro, &["never"]), false),
        ],
    );

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(request(&[Platform::Allegro]), adapters([allegro.clone()]))
        .unwrap();
    let records: Vec<ListingRecord> = stream.collect().await;
    let summary = handle.wait().await.unwrap();

    let outcome = summary.outcome(Platform::Allegro).unwrap();
    assert!(records.is_empty());
    assert_eq!(outcome.state, PlatformState::Blocked);
    assert_eq!(outcome.retries, 1, "a single re-check after the cooldown");
    assert_eq!(outcome.last_error, Some(ErrorClass::RateLimited));
    assert_eq!(allegro.fetches(), 2);
    assert_eq!(summary.state, SessionState::Completed);
}

#[tokio::test]
async fn unparseable_page_is_skipped() {
    let vinted = ScriptedAdapter::new(
        Platform::Vinted,
        vec![
            Step::Page(laptops(Platform::Vinted, &["v1"]), true),
            Step::Unparseable,
            Step::Page(laptops(Platform::Vinted, &["v2"]), false),
        ],
    );

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(request(&[Platform::Vinted]), adapters([vinted.clone()]))
        .unwrap();
    let records: Vec<ListingRecord> = stream.collect().await;
    let summary = handle.wait().await.unwrap();

    let outcome = summary.outcome(Platform::Vinted).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(outcome.state, PlatformState::Exhausted);
    assert_eq!(outcome.parse_errors, 1);
    assert_eq!(outcome.pages_skipped, 1);
    assert_eq!(outcome.retries, 0, "parse errors are not retried");
    assert_eq!(outcome.last_error, Some(ErrorClass::ParseError));
    assert_eq!(vinted.fetches(), 3);
    assert_eq!(outcome.summary(), "found 2, 1 pages skipped");
}

// ---------------------------------------------------------------------------
// filtering and deduplication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn records_are_filtered_and_deduplicated_per_platform() {
    let allegro = ScriptedAdapter::new(
        Platform::Allegro,
        vec![
            Step::Page(
                vec![
                    record(Platform::Allegro, "1", "Gaming laptop", Some("2500")),
                    record(Platform::Allegro, "2", "Gaming mouse", Some("150")),
                    record(Platform::Allegro, "3", "Laptop bag", None),
                ],
                true,
            ),
            Step::Page(
                vec![
                    record(Platform::Allegro, "1", "Gaming laptop", Some("2500")),
                    record(Platform::Allegro, "4", "Laptop stand", Some("90")),
                ],
                false,
            ),
        ],
    );
    // Same item id on another platform is a different listing.
    let olx = ScriptedAdapter::new(
        Platform::Olx,
        vec![Step::Page(laptops(Platform::Olx, &["1"]), false)],
    );

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(
            request(&[Platform::Allegro, Platform::Olx]),
            adapters([allegro, olx]),
        )
        .unwrap();
    let records: Vec<ListingRecord> = stream.collect().await;
    let summary = handle.wait().await.unwrap();

    let mut allegro_ids: Vec<&str> = records
        .iter()
        .filter(|r| r.platform == Platform::Allegro)
        .map(|r| r.item_id.as_str())
        .collect();
    allegro_ids.sort_unstable();
    assert_eq!(allegro_ids, vec!["1", "3", "4"]);
    assert!(records.iter().all(|r| r.matched_keywords == vec!["laptop"]));
    assert_eq!(
        records.iter().filter(|r| r.platform == Platform::Olx).count(),
        1
    );
    assert_eq!(summary.outcome(Platform::Allegro).unwrap().records_emitted, 3);
    assert_eq!(summary.total_records, 4);
}

// ---------------------------------------------------------------------------
// pagination, backpressure, cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn page_cap_stops_an_endless_platform() {
    let settings = ScanSettings {
        max_pages: 3,
        ..test_settings()
    };
    let allegro = ScriptedAdapter::endless(Platform::Allegro);

    let (stream, handle) = scanner(settings)
        .start_with_adapters(request(&[Platform::Allegro]), adapters([allegro.clone()]))
        .unwrap();
    let records: Vec<ListingRecord> = stream.collect().await;
    let summary = handle.wait().await.unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(allegro.fetches(), 3);
    let outcome = summary.outcome(Platform::Allegro).unwrap();
    assert_eq!(outcome.state, PlatformState::Exhausted);
    assert_eq!(outcome.pages_fetched, 3);
}

#[tokio::test]
async fn slow_consumer_holds_back_fetching() {
    let settings = ScanSettings {
        channel_capacity: 1,
        ..test_settings()
    };
    let olx = ScriptedAdapter::new(
        Platform::Olx,
        vec![
            Step::Page(laptops(Platform::Olx, &["o1", "o2", "o3", "o4"]), true),
            Step::Page(laptops(Platform::Olx, &["o5"]), false),
        ],
    );

    let (mut stream, handle) = scanner(settings)
        .start_with_adapters(request(&[Platform::Olx]), adapters([olx.clone()]))
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(olx.fetches(), 1, "worker must wait on the full channel");
    assert_eq!(handle.state(), SessionState::Running);

    let mut ids = Vec::new();
    while let Some(record) = stream.recv().await {
        ids.push(record.item_id);
    }
    let summary = handle.wait().await.unwrap();

    assert_eq!(ids, vec!["o1", "o2", "o3", "o4", "o5"]);
    assert_eq!(olx.fetches(), 2);
    assert_eq!(summary.state, SessionState::Completed);
}

#[tokio::test]
async fn cancel_stops_workers_and_reports_cancelled() {
    let settings = ScanSettings {
        channel_capacity: 1,
        ..test_settings()
    };
    let allegro = ScriptedAdapter::endless(Platform::Allegro);
    let olx = ScriptedAdapter::endless(Platform::Olx);

    let (mut stream, handle) = scanner(settings)
        .start_with_adapters(
            request(&[Platform::Allegro, Platform::Olx]),
            adapters([allegro, olx]),
        )
        .unwrap();

    assert!(stream.recv().await.is_some());
    handle.cancel();
    assert!(handle.is_cancelled());

    let mut after_cancel = 0;
    while stream.recv().await.is_some() {
        after_cancel += 1;
    }
    let summary = handle.wait().await.unwrap();

    assert!(after_cancel <= 1, "only already-buffered records arrive: {after_cancel}");
    assert_eq!(summary.state, SessionState::Cancelled);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.state == PlatformState::Cancelled));
}

#[tokio::test]
async fn dropping_the_stream_cancels_the_session() {
    let allegro = ScriptedAdapter::endless(Platform::Allegro);

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(request(&[Platform::Allegro]), adapters([allegro]))
        .unwrap();
    drop(stream);

    let summary = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .expect("session should stop once the stream is gone")
        .unwrap();
    assert_eq!(summary.state, SessionState::Cancelled);
}

// ---------------------------------------------------------------------------
// session state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_state_moves_from_running_to_completed() {
    let olx = ScriptedAdapter::new(
        Platform::Olx,
        vec![Step::Page(laptops(Platform::Olx, &["o1"]), false)],
    );

    let (stream, handle) = scanner(test_settings())
        .start_with_adapters(request(&[Platform::Olx]), adapters([olx]))
        .unwrap();
    let mut state = handle.subscribe();
    assert_eq!(*state.borrow(), SessionState::Running);

    drop(stream.collect::<Vec<_>>().await);
    state.changed().await.unwrap();
    assert_eq!(*state.borrow(), SessionState::Completed);
    assert!(state.borrow().is_terminal());

    assert!(!handle.is_cancelled(), "a drained stream does not cancel");

    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.state, SessionState::Completed);
}
