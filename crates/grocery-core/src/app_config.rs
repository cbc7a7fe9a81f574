use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub stores_path: PathBuf,
    pub cors_origins: Vec<String>,
    /// WebDriver endpoint used by browser-driven sources.
    pub webdriver_url: String,
    pub webdriver_token: Option<String>,
    pub browser_headless: bool,
    pub scraper_user_agent: String,
    pub scraper_request_timeout_secs: u64,
    pub scraper_inter_request_delay_ms: u64,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_secs: u64,
    pub challenge_timeout_secs: u64,
    pub challenge_poll_interval_ms: u64,
    /// Upper bound on one source's run inside an all-stores search.
    pub source_timeout_secs: u64,
    /// Largest superset fetched for a paged search.
    pub max_results: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("stores_path", &self.stores_path)
            .field("cors_origins", &self.cors_origins)
            .field("webdriver_url", &self.webdriver_url)
            .field(
                "webdriver_token",
                &self.webdriver_token.as_ref().map(|_| "[redacted]"),
            )
            .field("browser_headless", &self.browser_headless)
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field(
                "scraper_inter_request_delay_ms",
                &self.scraper_inter_request_delay_ms,
            )
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_secs",
                &self.scraper_retry_backoff_base_secs,
            )
            .field("challenge_timeout_secs", &self.challenge_timeout_secs)
            .field("challenge_poll_interval_ms", &self.challenge_poll_interval_ms)
            .field("source_timeout_secs", &self.source_timeout_secs)
            .field("max_results", &self.max_results)
            .finish()
    }
}
