//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default number of chunks a resumable resource is split into.
pub const DEFAULT_CHUNK_COUNT: u32 = 8;

/// Default in-flight chunk workers per download.
pub const DEFAULT_MAX_CHUNK_WORKERS: usize = 4;

/// Default global connection budget.
pub const DEFAULT_MAX_CONNECTIONS: usize = 16;

/// Default provider used when a request names none.
pub const DEFAULT_PROVIDER: &str = "direct";

/// Default page size for the sync surface.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Configuration for the download engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory finished files are moved into.
    pub download_dir: PathBuf,
    /// Directory holding partial files.
    pub staging_dir: PathBuf,
    /// Chunk count used for range-capable resources.
    pub preferred_chunk_count: u32,
    /// Chunk workers in flight per download.
    pub max_chunk_workers: usize,
    /// Chunk connections in flight across all downloads.
    pub max_connections: usize,
    /// Attempts per chunk after the first before a transient error fails the download.
    pub max_retries: u32,
    /// Backoff before the first retry; doubles per attempt.
    pub retry_base_delay: Duration,
    /// Backoff ceiling.
    pub retry_max_delay: Duration,
    /// Minimum interval between worker progress reports.
    pub progress_interval: Duration,
    /// Bytes after which a worker reports regardless of the interval.
    pub progress_byte_threshold: u64,
    /// How long pause/remove waits for workers to stop.
    pub cancel_grace: Duration,
    /// Bound on a provider credential refresh.
    pub reresolve_timeout: Duration,
    /// Downloads per page.
    pub page_size: usize,
    /// Provider used when a request names none.
    pub default_provider: String,
    /// User agent sent when a request does not override it.
    pub user_agent: String,
    /// Start transfers as soon as they are created.
    pub auto_start: bool,
    /// Weight of the newest sample in the speed average (0-1].
    pub speed_smoothing: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let download_dir = std::env::temp_dir().join("rapid");
        Self {
            staging_dir: download_dir.join(".partial"),
            download_dir,
            preferred_chunk_count: DEFAULT_CHUNK_COUNT,
            max_chunk_workers: DEFAULT_MAX_CHUNK_WORKERS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_retries: 5,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            progress_interval: Duration::from_millis(250),
            progress_byte_threshold: 256 * 1024,
            cancel_grace: Duration::from_secs(5),
            reresolve_timeout: Duration::from_secs(10),
            page_size: DEFAULT_PAGE_SIZE,
            default_provider: DEFAULT_PROVIDER.to_string(),
            user_agent: format!("rapid/{}", env!("CARGO_PKG_VERSION")),
            auto_start: true,
            speed_smoothing: 0.3,
        }
    }
}

impl EngineConfig {
    /// Configuration rooted at a download directory, staging under `<dir>/.partial`.
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        let download_dir = download_dir.into();
        Self {
            staging_dir: download_dir.join(".partial"),
            download_dir,
            ..Self::default()
        }
    }

    /// Set the staging directory for partial files.
    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Set the preferred chunk count.
    #[must_use]
    pub const fn with_chunk_count(mut self, count: u32) -> Self {
        self.preferred_chunk_count = count;
        self
    }

    /// Set the per-download worker cap.
    #[must_use]
    pub const fn with_max_chunk_workers(mut self, workers: usize) -> Self {
        self.max_chunk_workers = workers;
        self
    }

    /// Set the global connection budget.
    #[must_use]
    pub const fn with_max_connections(mut self, connections: usize) -> Self {
        self.max_connections = connections;
        self
    }

    /// Set the retry budget and backoff.
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Set the worker progress cadence.
    #[must_use]
    pub const fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the cancellation grace period.
    #[must_use]
    pub const fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Set the provider used when requests name none.
    #[must_use]
    pub fn with_default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = provider.into();
        self
    }

    /// Set the default user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enable or disable starting transfers on creation.
    #[must_use]
    pub const fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Set the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Backoff before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.retry_base_delay
            .saturating_mul(1u32 << exp)
            .min(self.retry_max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.preferred_chunk_count, 8);
        assert_eq!(config.max_chunk_workers, 4);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.default_provider, "direct");
        assert!(config.auto_start);
    }

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let config = EngineConfig::default();
        assert_eq!(config.retry_delay(1), Duration::from_millis(500));
        assert_eq!(config.retry_delay(2), Duration::from_secs(1));
        assert_eq!(config.retry_delay(3), Duration::from_secs(2));
        assert_eq!(config.retry_delay(20), Duration::from_secs(30));
    }

    #[test]
    fn test_new_stages_under_download_dir() {
        let config = EngineConfig::new("/tmp/dl").with_chunk_count(2);
        assert_eq!(config.staging_dir, PathBuf::from("/tmp/dl/.partial"));
        assert_eq!(config.preferred_chunk_count, 2);
    }
}
