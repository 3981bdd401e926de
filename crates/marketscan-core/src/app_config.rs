use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    /// Rules file to load instead of the bundled defaults.
    pub rules_path: Option<PathBuf>,
    pub scan: ScanSettings,
}

/// Tunables shared by every platform worker in a scan session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub retry_backoff_max_ms: u64,
    pub block_cooldown_secs: u64,
    pub max_pages: u32,
    pub inter_request_delay_ms: u64,
    pub channel_capacity: usize,
}

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_retries: 3,
            retry_backoff_base_ms: 1_000,
            retry_backoff_max_ms: 30_000,
            block_cooldown_secs: 30,
            max_pages: 5,
            inter_request_delay_ms: 1_000,
            channel_capacity: 64,
        }
    }
}

impl ScanSettings {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_base_ms)
    }

    #[must_use]
    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_max_ms)
    }

    #[must_use]
    pub fn block_cooldown(&self) -> Duration {
        Duration::from_secs(self.block_cooldown_secs)
    }

    #[must_use]
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }
}
