//! Refresh orchestration: fetch sources, parse candidates, validate, swap
//!
//! A refresh cycle takes its sequence ticket up front, so a cycle that is
//! overtaken by a newer one gets its completed snapshot discarded at
//! install time rather than clobbering fresher data. A cycle where every
//! source failed leaves the previous snapshot in place.

use crate::proxy::fetcher::{FetchOutcome, Source, SourceFetcher};
use crate::proxy::models::Candidate;
use crate::proxy::parser::CandidateParser;
use crate::proxy::pool::{PoolSnapshot, ProxyPool};
use crate::proxy::validator::Validator;
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Default scheduled refresh interval in seconds
const DEFAULT_INTERVAL_SECS: u64 = 600;

/// Minimum snapshot age before an on-demand refresh is honored, guarding
/// against a thundering herd of refreshes under load
const DEFAULT_MIN_STALENESS_SECS: u64 = 30;

/// Configuration for the refresh scheduler
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval between scheduled refresh cycles
    pub interval: Duration,
    /// Minimum snapshot age for on-demand refreshes
    pub min_staleness: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            min_staleness: Duration::from_secs(DEFAULT_MIN_STALENESS_SECS),
        }
    }
}

impl RefreshConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_min_staleness(mut self, min_staleness: Duration) -> Self {
        self.min_staleness = min_staleness;
        self
    }
}

/// Drives refresh cycles against a shared [`ProxyPool`].
pub struct Refresher {
    fetcher: SourceFetcher,
    validator: Validator,
    pool: Arc<ProxyPool>,
    sources: Vec<Source>,
    config: RefreshConfig,
}

impl Refresher {
    pub fn new(
        fetcher: SourceFetcher,
        validator: Validator,
        pool: Arc<ProxyPool>,
        sources: Vec<Source>,
    ) -> Self {
        Self::with_config(fetcher, validator, pool, sources, RefreshConfig::default())
    }

    pub fn with_config(
        fetcher: SourceFetcher,
        validator: Validator,
        pool: Arc<ProxyPool>,
        sources: Vec<Source>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            fetcher,
            validator,
            pool,
            sources,
            config,
        }
    }

    /// Run one full refresh cycle. Returns the size of the installed
    /// snapshot, or 0 when nothing was installed (every source failed, or
    /// a newer cycle already installed its result).
    pub async fn refresh_once(&self) -> usize {
        let seq = self.pool.begin_refresh();
        info!(seq, sources = self.sources.len(), "starting refresh cycle");

        let outcomes = self.fetcher.fetch_all(&self.sources).await;
        if !outcomes.iter().any(|o| o.is_success()) {
            warn!(seq, "every source failed; keeping previous snapshot");
            return 0;
        }

        let candidates = Self::collect_candidates(&outcomes);
        info!(seq, candidates = candidates.len(), "validating candidates");

        let validated = self.validator.validate_all(candidates).await;
        let size = validated.len();

        if self.pool.install(PoolSnapshot::new(validated, seq)) {
            size
        } else {
            0
        }
    }

    /// Run a refresh only if the pool has never refreshed or its snapshot
    /// is older than the staleness threshold. Returns whether a refresh
    /// actually ran.
    pub async fn refresh_if_stale(&self) -> bool {
        let snapshot = self.pool.current();
        let min_age = ChronoDuration::milliseconds(self.config.min_staleness.as_millis() as i64);
        if self.pool.has_refreshed() && snapshot.age() < min_age {
            return false;
        }
        self.refresh_once().await;
        true
    }

    /// Run the scheduled refresh loop until the task is dropped.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            ticker.tick().await;
            self.refresh_once().await;
        }
    }

    /// Parse every successful outcome with its source's parser and
    /// deduplicate across sources. Failed sources contribute nothing.
    fn collect_candidates(outcomes: &[FetchOutcome]) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for outcome in outcomes {
            let Some(body) = &outcome.body else { continue };
            let parsed = CandidateParser::parse(outcome.source.kind, body);
            info!(
                source = %outcome.source.name,
                count = parsed.len(),
                "parsed candidates"
            );
            candidates.extend(parsed);
        }
        CandidateParser::dedupe(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::fetcher::SourceKind;

    fn plain_source(name: &str) -> Source {
        Source::new(name, "http://example.com/proxies.txt", SourceKind::PlainText)
    }

    #[test]
    fn test_refresh_config_default() {
        let config = RefreshConfig::default();
        assert_eq!(config.interval, Duration::from_secs(DEFAULT_INTERVAL_SECS));
        assert_eq!(
            config.min_staleness,
            Duration::from_secs(DEFAULT_MIN_STALENESS_SECS)
        );
    }

    #[test]
    fn test_refresh_config_builder() {
        let config = RefreshConfig::new()
            .with_interval(Duration::from_secs(60))
            .with_min_staleness(Duration::from_secs(5));
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.min_staleness, Duration::from_secs(5));
    }

    #[test]
    fn test_collect_candidates_isolates_failed_source() {
        let outcomes = vec![
            FetchOutcome::success(plain_source("good"), "1.1.1.1:80\n2.2.2.2:81\n".to_string()),
            FetchOutcome::failure(plain_source("dead"), "connection timed out".to_string()),
        ];

        let candidates = Refresher::collect_candidates(&outcomes);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.host.starts_with("1.") || c.host.starts_with("2.")));
    }

    #[test]
    fn test_collect_candidates_dedupes_across_sources() {
        let outcomes = vec![
            FetchOutcome::success(plain_source("a"), "1.1.1.1:80\n".to_string()),
            FetchOutcome::success(plain_source("b"), "1.1.1.1:80\n3.3.3.3:82\n".to_string()),
        ];

        let candidates = Refresher::collect_candidates(&outcomes);
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_total_source_failure_keeps_previous_snapshot() {
        // Nothing listens on this address; both fetch attempts fail fast.
        let sources = vec![Source::new(
            "unreachable",
            "http://127.0.0.1:9/proxies.txt",
            SourceKind::PlainText,
        )];

        let pool = Arc::new(ProxyPool::new());
        let refresher = Refresher::new(
            SourceFetcher::new().unwrap(),
            Validator::new(),
            Arc::clone(&pool),
            sources,
        );

        let installed = refresher.refresh_once().await;
        assert_eq!(installed, 0);
        assert!(!pool.has_refreshed());
        assert!(pool.current().is_empty());
    }
}
