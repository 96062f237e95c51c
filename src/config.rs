use anyhow::{anyhow, Result};
use clap::Args;

/// Connection and feed settings.
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// Base URL of the REST API
    #[arg(long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Request timeout in milliseconds (1000-60000)
    #[arg(long, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Posts per page and per source (1-50)
    #[arg(long, env = "FEED_PAGE_SIZE")]
    pub feed_page_size: Option<u32>,

    /// Feed polling interval in milliseconds for --watch (1000-600000)
    #[arg(long, env = "POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Path to the SQLite file holding the session credential
    #[arg(long = "credential-db", env = "CREDENTIAL_DB_PATH")]
    pub credential_db_path: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub request_timeout_ms: u64,
    pub feed_page_size: u32,
    pub poll_interval_ms: u64,
    pub credential_db_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api/v1".to_string(),
            request_timeout_ms: 8000,
            feed_page_size: 10,
            poll_interval_ms: 30_000,
            credential_db_path: "./claroz_session.db".to_string(),
        }
    }
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{name} must start with http:// or https://"))
    }
}

impl Config {
    /// Resolve parsed arguments (clap already folded in the environment)
    /// against defaults and validate.
    pub fn from_args(args: CliArgs) -> Result<Config> {
        let defaults = Config::default();

        let api_url = args.api_url.unwrap_or(defaults.api_url);
        validate_url(&api_url, "API_URL")?;

        let request_timeout_ms = validate_in_range(
            args.request_timeout_ms.unwrap_or(defaults.request_timeout_ms),
            1000,
            60_000,
            "REQUEST_TIMEOUT_MS",
        )?;

        // The server caps pageSize at 50.
        let feed_page_size = validate_in_range(
            args.feed_page_size.unwrap_or(defaults.feed_page_size),
            1,
            50,
            "FEED_PAGE_SIZE",
        )?;

        let poll_interval_ms = validate_in_range(
            args.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
            1000,
            600_000,
            "POLL_INTERVAL_MS",
        )?;

        let credential_db_path = args
            .credential_db_path
            .unwrap_or(defaults.credential_db_path);
        if credential_db_path.trim().is_empty() {
            return Err(anyhow!("CREDENTIAL_DB_PATH cannot be empty"));
        }

        Ok(Config {
            api_url: api_url.trim_end_matches('/').to_string(),
            request_timeout_ms,
            feed_page_size,
            poll_interval_ms,
            credential_db_path,
        })
    }

    /// Print current configuration (useful for debugging)
    pub fn log_summary(&self) {
        log::info!("Claroz configuration:");
        log::info!("  API URL: {}", self.api_url);
        log::info!("  Request timeout: {}ms", self.request_timeout_ms);
        log::info!("  Feed page size: {}", self.feed_page_size);
        log::info!("  Poll interval: {}ms", self.poll_interval_ms);
        log::info!("  Credential DB: {}", self.credential_db_path);
    }
}
