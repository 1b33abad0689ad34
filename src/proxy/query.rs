//! Query engine module for filtering the pool snapshot
//!
//! Queries are pure reads against an in-memory snapshot and return
//! immediately; they never touch the network. An empty result is a normal
//! outcome, not an error.

use crate::proxy::models::{Anonymity, Schema, ValidatedProxy};
use crate::proxy::pool::{PoolSnapshot, ProxyPool};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashMap;

/// Default number of proxies returned by list queries
pub const DEFAULT_LIMIT: i64 = 10;

/// Bounds the list-query result count; out-of-range values are clamped
pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 100;

/// Caller-specified selection criteria. Ephemeral, one per request.
#[derive(Debug, Clone, Default)]
pub struct QueryCriteria {
    /// Exact-match country code filter
    pub country: Option<String>,
    /// Only anonymous-or-better proxies
    pub anonymous: bool,
    /// Only elite proxies
    pub elite: bool,
    /// Only proxies confirmed over HTTPS
    pub https: bool,
    /// Tri-state google-compatibility filter; `None` ignores the flag
    pub google: Option<bool>,
    /// Randomize selection order per request
    pub random: bool,
    /// Result-count bound for list queries, clamped into [1, 100]
    pub limit: Option<i64>,
}

impl QueryCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_country(mut self, country: &str) -> Self {
        self.country = Some(country.trim().to_ascii_uppercase());
        self
    }

    pub fn with_anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    pub fn with_elite(mut self, elite: bool) -> Self {
        self.elite = elite;
        self
    }

    pub fn with_https(mut self, https: bool) -> Self {
        self.https = https;
        self
    }

    pub fn with_google(mut self, google: bool) -> Self {
        self.google = Some(google);
        self
    }

    pub fn with_random(mut self, random: bool) -> Self {
        self.random = random;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a validated proxy qualifies under these criteria.
    pub fn matches(&self, proxy: &ValidatedProxy) -> bool {
        if let Some(country) = &self.country {
            // Proxies with unknown country never qualify under a country
            // filter, but do qualify when no filter is given.
            match &proxy.country {
                Some(code) if code == country => {}
                _ => return false,
            }
        }

        if self.elite {
            if proxy.anonymity != Anonymity::Elite {
                return false;
            }
        } else if self.anonymous && proxy.anonymity < Anonymity::Anonymous {
            return false;
        }

        if self.https && proxy.schema != Schema::Https {
            return false;
        }

        if let Some(google) = self.google {
            if proxy.google != google {
                return false;
            }
        }

        true
    }

    /// The effective list-query bound: caller value clamped into range,
    /// default when unspecified.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(MIN_LIMIT, MAX_LIMIT) as usize
    }
}

/// Single-proxy response shape
#[derive(Debug, Clone, Serialize)]
pub struct ProxyResponse {
    pub proxy: String,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// List response shape; `count` always equals `proxies.len()`
#[derive(Debug, Clone, Serialize)]
pub struct ProxyListResponse {
    pub proxies: Vec<String>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Config response shape wrapping the proxy URL for HTTP-client and
/// browser-automation consumers
#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfigResponse {
    pub proxy_url: String,
    pub requests: HashMap<String, String>,
    pub playwright: HashMap<String, String>,
}

/// Select the qualifying proxies from a snapshot, in stable snapshot order
/// or shuffled per request when `random` is set. Not count-bounded; the
/// callers apply their own bound.
pub fn select(snapshot: &PoolSnapshot, criteria: &QueryCriteria) -> Vec<ValidatedProxy> {
    let mut qualifying: Vec<ValidatedProxy> = snapshot
        .proxies
        .iter()
        .filter(|p| criteria.matches(p))
        .cloned()
        .collect();

    if criteria.random {
        qualifying.shuffle(&mut rand::thread_rng());
    }

    qualifying
}

/// Get a single qualifying proxy, or `None` when nothing matches.
pub fn query_single(pool: &ProxyPool, criteria: &QueryCriteria) -> Option<ProxyResponse> {
    let snapshot = pool.current();
    let proxy = select(&snapshot, criteria).into_iter().next()?;
    Some(ProxyResponse {
        proxy: proxy.url(),
        schema: proxy.schema,
        country: proxy.country,
    })
}

/// Get a count-bounded list of qualifying proxies. An empty list with
/// `count: 0` is a normal result.
pub fn query_list(pool: &ProxyPool, criteria: &QueryCriteria) -> ProxyListResponse {
    let snapshot = pool.current();
    let proxies: Vec<String> = select(&snapshot, criteria)
        .into_iter()
        .take(criteria.effective_limit())
        .map(|p| p.url())
        .collect();

    ProxyListResponse {
        count: proxies.len(),
        proxies,
        country: criteria.country.clone(),
    }
}

/// Get a single qualifying proxy as ready-to-use client configuration.
pub fn query_config(pool: &ProxyPool, criteria: &QueryCriteria) -> Option<ProxyConfigResponse> {
    let snapshot = pool.current();
    let proxy = select(&snapshot, criteria).into_iter().next()?;
    let url = proxy.url();

    let mut requests = HashMap::new();
    requests.insert(proxy.schema.to_string(), url.clone());

    let mut playwright = HashMap::new();
    playwright.insert("server".to_string(), url.clone());

    Some(ProxyConfigResponse {
        proxy_url: url,
        requests,
        playwright,
    })
}
