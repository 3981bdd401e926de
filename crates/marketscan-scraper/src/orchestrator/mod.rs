//! Scan sessions: one worker task per platform, merged into a single bounded
//! record stream, with a supervisor that produces the final [`ScanSummary`].

mod worker;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::join_all;
use futures::Stream;
use marketscan_core::{
    ListingRecord, Platform, PlatformOutcome, PlatformState, RulesFile, ScanRequest,
    ScanSettings, ScanSummary, SessionState, ValidationError,
};
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::adapter::{HttpAdapter, PlatformAdapter};
use crate::error::ScanError;
use crate::extract::CompiledRules;

use worker::{PlatformWorker, WorkerConfig};

/// Starts scan sessions against the configured platforms.
///
/// Rules are compiled and the HTTP client is built once, in [`Scanner::new`];
/// each session gets fresh adapters sharing them.
pub struct Scanner {
    settings: ScanSettings,
    rules: HashMap<Platform, Arc<CompiledRules>>,
    client: Client,
}

impl Scanner {
    /// # Errors
    ///
    /// Returns [`ScanError::Rules`] if any platform's rules fail to compile and
    /// [`ScanError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: ScanSettings, rules: &RulesFile) -> Result<Self, ScanError> {
        let compiled = rules
            .platforms
            .iter()
            .map(|(&platform, r)| {
                CompiledRules::compile(platform, r).map(|c| (platform, Arc::new(c)))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        let client = HttpAdapter::build_client(&settings)?;
        Ok(Self {
            settings,
            rules: compiled,
            client,
        })
    }

    /// Platforms that have rules, in a stable order.
    #[must_use]
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self.rules.keys().copied().collect();
        platforms.sort();
        platforms
    }

    #[must_use]
    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Starts a session using the HTTP adapter for every requested platform.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingRules`] if a requested platform has
    /// no rules. Nothing is spawned on error.
    pub fn start(
        &self,
        request: ScanRequest,
    ) -> Result<(RecordStream, CompletionHandle), ValidationError> {
        let mut adapters: Vec<Arc<dyn PlatformAdapter>> = Vec::new();
        for &platform in request.platforms() {
            let rules = self
                .rules
                .get(&platform)
                .ok_or(ValidationError::MissingRules(platform))?;
            adapters.push(Arc::new(HttpAdapter::new(
                Arc::clone(rules),
                self.client.clone(),
                self.settings.request_timeout(),
            )));
        }
        Ok(self.launch(request, adapters))
    }

    /// Starts a session with caller-supplied adapters.
    ///
    /// Each requested platform needs an adapter reporting that platform;
    /// adapters for platforms not in the request are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingRules`] for a requested platform
    /// without an adapter.
    pub fn start_with_adapters(
        &self,
        request: ScanRequest,
        adapters: Vec<Arc<dyn PlatformAdapter>>,
    ) -> Result<(RecordStream, CompletionHandle), ValidationError> {
        let mut by_platform: HashMap<Platform, Arc<dyn PlatformAdapter>> = adapters
            .into_iter()
            .map(|adapter| (adapter.platform(), adapter))
            .collect();

        let ordered = request
            .platforms()
            .iter()
            .map(|&platform| {
                by_platform
                    .remove(&platform)
                    .ok_or(ValidationError::MissingRules(platform))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.launch(request, ordered))
    }

    fn launch(
        &self,
        request: ScanRequest,
        adapters: Vec<Arc<dyn PlatformAdapter>>,
    ) -> (RecordStream, CompletionHandle) {
        let (tx, rx) = mpsc::channel(self.settings.channel_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(SessionState::Running);
        let cancel = CancellationToken::new();
        let request = Arc::new(request);
        let config = WorkerConfig::from_settings(&self.settings);

        tracing::info!(
            platforms = ?request.platforms(),
            query = %request.search_query(),
            "scan session started"
        );

        let workers: Vec<(Platform, JoinHandle<PlatformOutcome>)> = adapters
            .into_iter()
            .map(|adapter| {
                let platform = adapter.platform();
                let worker = PlatformWorker {
                    adapter,
                    request: Arc::clone(&request),
                    tx: tx.clone(),
                    cancel: cancel.clone(),
                    config: config.clone(),
                };
                (platform, tokio::spawn(worker.run()))
            })
            .collect();
        drop(tx);

        let supervisor = tokio::spawn(supervise(workers, state_tx));

        let stream = RecordStream {
            rx,
            cancel: cancel.clone(),
            drained: false,
        };
        let handle = CompletionHandle {
            cancel,
            state: state_rx,
            supervisor,
        };
        (stream, handle)
    }
}

/// Awaits every worker and publishes the session's final state.
async fn supervise(
    workers: Vec<(Platform, JoinHandle<PlatformOutcome>)>,
    state_tx: watch::Sender<SessionState>,
) -> ScanSummary {
    let (platforms, handles): (Vec<_>, Vec<_>) = workers.into_iter().unzip();
    let results = join_all(handles).await;

    let outcomes = platforms
        .into_iter()
        .zip(results)
        .map(|(platform, result)| match result {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(platform = %platform, error = %err, "platform worker panicked");
                PlatformOutcome {
                    state: PlatformState::Errored,
                    ..PlatformOutcome::new(platform)
                }
            }
        })
        .collect();

    let summary = ScanSummary::from_outcomes(outcomes);
    tracing::info!(
        state = %summary.state,
        total_records = summary.total_records,
        "scan session finished"
    );
    state_tx.send_replace(summary.state);
    summary
}

/// Merged, filtered, deduplicated records from every platform in a session.
///
/// Ends once every worker has finished. Dropping the stream cancels the
/// session.
pub struct RecordStream {
    rx: mpsc::Receiver<ListingRecord>,
    cancel: CancellationToken,
    /// Set once `recv` has returned `None`.
    drained: bool,
}

impl RecordStream {
    pub async fn recv(&mut self) -> Option<ListingRecord> {
        let next = self.rx.recv().await;
        self.drained = next.is_none();
        next
    }
}

impl Stream for RecordStream {
    type Item = ListingRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = self.rx.poll_recv(cx);
        if let Poll::Ready(next) = &poll {
            self.drained = next.is_none();
        }
        poll
    }
}

impl Drop for RecordStream {
    /// Dropping an unfinished stream cancels the session; a fully drained one
    /// leaves the token alone.
    fn drop(&mut self) {
        if !self.drained {
            self.cancel.cancel();
        }
    }
}

/// Control and completion side of a scan session.
pub struct CompletionHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SessionState>,
    supervisor: JoinHandle<ScanSummary>,
}

impl CompletionHandle {
    /// Requests cancellation. Workers finish their in-flight fetch and stop
    /// without emitting further records.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current session state: `Running` until the supervisor publishes the
    /// final state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// A receiver that observes state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Waits for every worker to finish and returns the session summary.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Join`] if the supervisor task itself failed.
    pub async fn wait(self) -> Result<ScanSummary, ScanError> {
        self.supervisor
            .await
            .map_err(|e| ScanError::Join(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanner_compiles_bundled_rules() {
        let rules = marketscan_core::bundled_rules().unwrap();
        let scanner = Scanner::new(ScanSettings::default(), &rules).unwrap();
        assert_eq!(scanner.platforms(), Platform::ALL.to_vec());
    }

    #[tokio::test]
    async fn start_rejects_platform_without_rules() {
        let scanner = Scanner::new(ScanSettings::default(), &RulesFile::default()).unwrap();
        let request = ScanRequest::builder()
            .platform(Platform::Vinted)
            .build()
            .unwrap();
        let err = scanner.start(request).err();
        assert_eq!(err, Some(ValidationError::MissingRules(Platform::Vinted)));
    }

    #[tokio::test]
    async fn start_with_adapters_requires_every_platform() {
        let scanner = Scanner::new(ScanSettings::default(), &RulesFile::default()).unwrap();
        let request = ScanRequest::builder()
            .platforms([Platform::Olx, Platform::Allegro])
            .build()
            .unwrap();
        let err = scanner.start_with_adapters(request, Vec::new()).err();
        assert_eq!(err, Some(ValidationError::MissingRules(Platform::Olx)));
    }
}
