//! Source fetcher module for retrieving raw proxy listings
//!
//! Each configured source is fetched independently with a bounded timeout.
//! A source that fails a transient way gets one retry; a source that fails
//! twice is skipped for the refresh cycle and logged, never escalated.

use crate::Result;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for source fetches in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// How many sources are fetched at the same time
const FETCH_CONCURRENCY: usize = 8;

/// Document shape a source serves, used to pick the parsing routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// free-proxy-list.net style HTML table (IP/Port/Code/Country/Anonymity/Google/Https)
    ListingTable,
    /// One IP:PORT entry per line
    PlainText,
}

/// A proxy listing source: a website serving harvestable proxy entries.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub url: String,
    pub kind: SourceKind,
}

impl Source {
    pub fn new(name: &str, url: &str, kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind,
        }
    }
}

/// Result of fetching a single source
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The source that was fetched
    pub source: Source,
    /// Raw document body when the fetch succeeded
    pub body: Option<String>,
    /// Error message if fetching failed twice
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn success(source: Source, body: String) -> Self {
        Self {
            source,
            body: Some(body),
            error: None,
        }
    }

    pub fn failure(source: Source, error: String) -> Self {
        Self {
            source,
            body: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Configuration for the source fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Per-source timeout
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Source fetcher for retrieving raw listings from proxy sources
pub struct SourceFetcher {
    client: Client,
}

impl SourceFetcher {
    /// Create a new fetcher with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(FetcherConfig::default())
    }

    /// Create a new fetcher with custom configuration
    pub fn with_config(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch a single source, retrying once on transient network failure.
    pub async fn fetch_source(&self, source: &Source) -> FetchOutcome {
        match self.fetch_once(&source.url).await {
            Ok(body) => FetchOutcome::success(source.clone(), body),
            Err(first) if Self::is_transient(&first) => {
                debug!(source = %source.name, error = %first, "transient fetch failure, retrying");
                match self.fetch_once(&source.url).await {
                    Ok(body) => FetchOutcome::success(source.clone(), body),
                    Err(second) => {
                        warn!(source = %source.name, error = %second, "source failed twice, skipping for this cycle");
                        FetchOutcome::failure(source.clone(), second.to_string())
                    }
                }
            }
            Err(e) => {
                warn!(source = %source.name, error = %e, "source fetch failed, skipping for this cycle");
                FetchOutcome::failure(source.clone(), e.to_string())
            }
        }
    }

    /// Fetch all sources concurrently, returning one outcome per source.
    ///
    /// Failures are isolated: a dead source never blocks or fails the rest.
    pub async fn fetch_all(&self, sources: &[Source]) -> Vec<FetchOutcome> {
        stream::iter(sources)
            .map(|source| self.fetch_source(source))
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect()
            .await
    }

    async fn fetch_once(&self, url: &str) -> reqwest::Result<String> {
        let response = self.client.get(url).send().await?;
        let response = response.error_for_status()?;
        response.text().await
    }

    fn is_transient(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect()
    }

    /// Get the default set of free proxy listing sources
    pub fn default_sources() -> Vec<Source> {
        vec![
            Source::new(
                "free-proxy-list.net",
                "https://free-proxy-list.net/",
                SourceKind::ListingTable,
            ),
            Source::new(
                "sslproxies.org",
                "https://www.sslproxies.org/",
                SourceKind::ListingTable,
            ),
            Source::new(
                "us-proxy.org",
                "https://www.us-proxy.org/",
                SourceKind::ListingTable,
            ),
            Source::new(
                "proxyscrape.com",
                "https://api.proxyscrape.com/v2/?request=getproxies&protocol=http",
                SourceKind::PlainText,
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_config_default() {
        let config = FetcherConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_fetcher_config_builder() {
        let config = FetcherConfig::new()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("Custom Agent".to_string());

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "Custom Agent");
    }

    #[test]
    fn test_source_creation() {
        let source = Source::new(
            "test-source",
            "https://example.com/proxies.txt",
            SourceKind::PlainText,
        );
        assert_eq!(source.name, "test-source");
        assert_eq!(source.url, "https://example.com/proxies.txt");
        assert_eq!(source.kind, SourceKind::PlainText);
    }

    #[test]
    fn test_fetch_outcome_success() {
        let source = Source::new("test", "https://example.com", SourceKind::PlainText);
        let outcome = FetchOutcome::success(source, "1.2.3.4:80".to_string());
        assert!(outcome.is_success());
        assert_eq!(outcome.body.as_deref(), Some("1.2.3.4:80"));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_fetch_outcome_failure() {
        let source = Source::new("test", "https://example.com", SourceKind::PlainText);
        let outcome = FetchOutcome::failure(source, "connection refused".to_string());
        assert!(!outcome.is_success());
        assert!(outcome.body.is_none());
        assert_eq!(outcome.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_default_sources() {
        let sources = SourceFetcher::default_sources();
        assert!(!sources.is_empty());
        for source in &sources {
            assert!(!source.name.is_empty());
            assert!(source.url.starts_with("http"));
        }
    }
}
