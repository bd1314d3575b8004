use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Crawler concurrency configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of concurrent page downloads
    pub downloaders: usize,

    /// Maximum number of concurrent link extractions
    pub extractors: usize,

    /// Maximum number of concurrent download + extraction operations per host
    #[serde(rename = "per-host")]
    pub per_host: usize,

    /// How long `close()` lets running work drain before cancelling it (milliseconds)
    #[serde(rename = "close-timeout-ms")]
    pub close_timeout_ms: u64,
}

impl CrawlerConfig {
    pub const DEFAULT_DOWNLOADERS: usize = 2;
    pub const DEFAULT_EXTRACTORS: usize = 2;
    pub const DEFAULT_PER_HOST: usize = 2;
    pub const DEFAULT_CLOSE_TIMEOUT_MS: u64 = 500;

    /// Creates a configuration with the given pool sizes and the default
    /// close timeout
    pub fn new(downloaders: usize, extractors: usize, per_host: usize) -> Self {
        Self {
            downloaders,
            extractors,
            per_host,
            ..Self::default()
        }
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            downloaders: Self::DEFAULT_DOWNLOADERS,
            extractors: Self::DEFAULT_EXTRACTORS,
            per_host: Self::DEFAULT_PER_HOST,
            close_timeout_ms: Self::DEFAULT_CLOSE_TIMEOUT_MS,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("wave-crawler/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}
