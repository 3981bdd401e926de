use serde::Serialize;

use crate::platform::Platform;

/// Lifecycle of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Per-platform state. Everything except `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformState {
    Active,
    Blocked,
    Exhausted,
    Errored,
    Cancelled,
}

impl PlatformState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, PlatformState::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Timeout,
    NetworkError,
    Blocked,
    ParseError,
    RateLimited,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorClass::Timeout => "timeout",
            ErrorClass::NetworkError => "network error",
            ErrorClass::Blocked => "blocked",
            ErrorClass::ParseError => "parse error",
            ErrorClass::RateLimited => "rate limited",
        };
        f.write_str(s)
    }
}

/// Final report for one platform in one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformOutcome {
    pub platform: Platform,
    pub state: PlatformState,
    pub records_emitted: u64,
    pub pages_fetched: u32,
    pub retries: u32,
    /// Pages given up on (exhausted retries or unparseable) while pagination continued.
    pub pages_skipped: u32,
    pub parse_errors: u32,
    pub last_error: Option<ErrorClass>,
}

impl PlatformOutcome {
    /// A zeroed outcome in the `Active` state.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            state: PlatformState::Active,
            records_emitted: 0,
            pages_fetched: 0,
            retries: 0,
            pages_skipped: 0,
            parse_errors: 0,
            last_error: None,
        }
    }

    /// One-line status, e.g. `"found 12, 0 errors"` or `"blocked, 3 found"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let n = self.records_emitted;
        match self.state {
            PlatformState::Blocked => format!("blocked, {n} found"),
            PlatformState::Errored => format!("error after {} retries, {n} found", self.retries),
            PlatformState::Cancelled => format!("cancelled, {n} found"),
            PlatformState::Active => format!("running, {n} found"),
            PlatformState::Exhausted if self.pages_skipped > 0 => {
                format!("found {n}, {} pages skipped", self.pages_skipped)
            }
            PlatformState::Exhausted => format!("found {n}, 0 errors"),
        }
    }
}

impl std::fmt::Display for PlatformOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.platform.display_name(), self.summary())
    }
}

/// Result of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub state: SessionState,
    /// One entry per enabled platform, in request order.
    pub outcomes: Vec<PlatformOutcome>,
    pub total_records: u64,
}

impl ScanSummary {
    /// Derives the session state from per-platform outcomes.
    ///
    /// `Cancelled` wins if any platform was cancelled; `Failed` requires every
    /// platform to have errored; otherwise `Completed`.
    #[must_use]
    pub fn from_outcomes(outcomes: Vec<PlatformOutcome>) -> Self {
        let state = if outcomes
            .iter()
            .any(|o| o.state == PlatformState::Cancelled)
        {
            SessionState::Cancelled
        } else if !outcomes.is_empty()
            && outcomes.iter().all(|o| o.state == PlatformState::Errored)
        {
            SessionState::Failed
        } else {
            SessionState::Completed
        };
        let total_records = outcomes.iter().map(|o| o.records_emitted).sum();
        Self {
            state,
            outcomes,
            total_records,
        }
    }

    #[must_use]
    pub fn outcome(&self, platform: Platform) -> Option<&PlatformOutcome> {
        self.outcomes.iter().find(|o| o.platform == platform)
    }
}
