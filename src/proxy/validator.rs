//! Proxy validator module for probing candidate liveness and anonymity
//!
//! Candidates are used as forward proxies against a judge endpoint that
//! echoes the request origin and headers. Probes run concurrently under a
//! bounded worker count; one hanging candidate delays nothing beyond its
//! own timeout. Anonymity is derived deterministically from the judge
//! output, preferring probe-confirmed values over source hints and falling
//! to the lowest confirmable tier when the probe cannot distinguish.

use crate::proxy::geo::CountryResolver;
use crate::proxy::models::{Anonymity, Candidate, Schema, ValidatedProxy};
use crate::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Proxy as ReqwestProxy};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Default per-probe timeout in milliseconds
const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default number of concurrent probes
const DEFAULT_CONCURRENCY: usize = 50;

/// Default judge endpoint echoing origin and headers as JSON
const DEFAULT_JUDGE_URL: &str = "http://httpbin.org/get";

/// Judge endpoint reached over TLS, used to confirm HTTPS support
const DEFAULT_HTTPS_JUDGE_URL: &str = "https://httpbin.org/get";

/// Endpoint for the secondary google-compatibility probe
const DEFAULT_GOOGLE_URL: &str = "https://www.google.com/";

/// Timeout for the one-off unproxied egress IP detection
const DETECT_TIMEOUT_SECS: u64 = 5;

/// Configuration for the proxy validator
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Timeout for each individual probe
    pub timeout: Duration,
    /// Number of concurrent probes
    pub concurrency: usize,
    /// Judge URL reached over plain HTTP
    pub judge_url: String,
    /// Judge URL reached over HTTPS
    pub https_judge_url: String,
    /// URL for the google-compatibility probe
    pub google_url: String,
    /// Path to MMDB file for country cross-checks (optional)
    pub mmdb_path: Option<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            concurrency: DEFAULT_CONCURRENCY,
            judge_url: DEFAULT_JUDGE_URL.to_string(),
            https_judge_url: DEFAULT_HTTPS_JUDGE_URL.to_string(),
            google_url: DEFAULT_GOOGLE_URL.to_string(),
            mmdb_path: None,
        }
    }
}

impl ValidatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-probe timeout from caller-provided seconds.
    ///
    /// Non-finite, non-positive and overflowing values fall back to the
    /// default instead of panicking, so a raw query parameter can be passed
    /// straight through.
    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout = match Duration::try_from_secs_f64(secs) {
            Ok(timeout) if !timeout.is_zero() => timeout,
            _ => Duration::from_millis(DEFAULT_TIMEOUT_MS),
        };
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_judge_url(mut self, url: String) -> Self {
        self.judge_url = url;
        self
    }

    pub fn with_https_judge_url(mut self, url: String) -> Self {
        self.https_judge_url = url;
        self
    }

    pub fn with_google_url(mut self, url: String) -> Self {
        self.google_url = url;
        self
    }

    pub fn with_mmdb_path(mut self, path: String) -> Self {
        self.mmdb_path = Some(path);
        self
    }
}

/// What the judge endpoint reported back about a probe.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JudgeReport {
    /// Origin address the judge saw the request arrive from
    pub origin: Option<String>,
    /// Whether a Via header reached the judge
    pub via: bool,
    /// X-Forwarded-For / Forwarded header value, if one reached the judge
    pub forwarded_for: Option<String>,
}

impl JudgeReport {
    /// Parse a judge response body (httpbin-style JSON with `origin` and
    /// `headers`). Returns `None` when the body is not usable as a report.
    pub fn parse(body: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(body).ok()?;
        let origin = value
            .get("origin")
            .and_then(|o| o.as_str())
            .map(str::to_string);

        let mut via = false;
        let mut forwarded_for = None;
        if let Some(headers) = value.get("headers").and_then(|h| h.as_object()) {
            for (name, val) in headers {
                match name.to_ascii_lowercase().as_str() {
                    "via" => via = true,
                    "x-forwarded-for" | "forwarded" => {
                        forwarded_for = val.as_str().map(str::to_string);
                    }
                    _ => {}
                }
            }
        }

        if origin.is_none() && !via && forwarded_for.is_none() {
            return None;
        }
        Some(Self {
            origin,
            via,
            forwarded_for,
        })
    }

    /// Whether the report discloses the given address anywhere.
    pub fn mentions(&self, ip: &str) -> bool {
        self.origin.as_deref().is_some_and(|o| o.contains(ip))
            || self.forwarded_for.as_deref().is_some_and(|f| f.contains(ip))
    }

    /// Whether any proxy-disclosing header reached the judge.
    pub fn forwarding_headers_present(&self) -> bool {
        self.via || self.forwarded_for.is_some()
    }
}

/// Derive the anonymity tier from the source hint and the judge report.
///
/// Probe-confirmed values always win over source hints. When the client's
/// own egress IP is known the full three tiers are distinguishable; without
/// it an IP leak cannot be ruled out, so Elite is never confirmable and the
/// result falls to the lowest tier the probe (capped by the hint) supports.
pub fn derive_anonymity(
    hint: Option<Anonymity>,
    report: Option<&JudgeReport>,
    client_ip: Option<&str>,
) -> Anonymity {
    let Some(report) = report else {
        // Judge response unusable: tier indistinguishable.
        return Anonymity::Transparent;
    };

    if let Some(ip) = client_ip {
        if report.mentions(ip) {
            return Anonymity::Transparent;
        }
        if report.forwarding_headers_present() {
            return Anonymity::Anonymous;
        }
        return Anonymity::Elite;
    }

    // Egress IP unknown: a forwarded header might carry it, so treat any
    // forwarding disclosure as transparent. Clean headers confirm at most
    // Anonymous, and a lower source claim is kept rather than upgraded.
    if report.forwarding_headers_present() {
        return Anonymity::Transparent;
    }
    hint.unwrap_or(Anonymity::Anonymous).min(Anonymity::Anonymous)
}

/// Proxy validator for probing candidates
pub struct Validator {
    config: ValidatorConfig,
    resolver: Option<CountryResolver>,
    client_ip: Option<String>,
}

impl Validator {
    /// Create a new validator with default configuration
    pub fn new() -> Self {
        Self::with_config(ValidatorConfig::default())
    }

    /// Create a new validator with custom configuration
    pub fn with_config(config: ValidatorConfig) -> Self {
        let resolver = config
            .mmdb_path
            .as_ref()
            .and_then(|path| CountryResolver::from_path(path).ok());

        Self {
            config,
            resolver,
            client_ip: None,
        }
    }

    /// Override the per-probe timeout, e.g. for an on-demand refresh.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout = timeout;
    }

    /// Learn the local egress IP with one unproxied judge request.
    ///
    /// Failure is tolerated: without the egress IP, anonymity derivation
    /// simply falls back to the lowest confirmable tier.
    pub async fn detect_client_ip(&mut self) {
        let client = match Client::builder()
            .timeout(Duration::from_secs(DETECT_TIMEOUT_SECS))
            .build()
        {
            Ok(client) => client,
            Err(_) => return,
        };

        let body = match client.get(&self.config.judge_url).send().await {
            Ok(response) => response.text().await.ok(),
            Err(_) => None,
        };

        if let Some(report) = body.as_deref().and_then(JudgeReport::parse) {
            if let Some(origin) = report.origin {
                debug!(egress = %origin, "detected local egress address");
                self.client_ip = Some(origin);
            }
        }
    }

    /// Probe a single candidate. Returns `None` for any candidate that is
    /// unreachable, times out, or answers with a protocol error; such
    /// candidates never enter the pool.
    ///
    /// Each probe honors its own timeout, so a candidate claiming HTTPS can
    /// spend up to three of them on the wall clock (HTTPS judge, HTTP
    /// fallback, google probe). The per-candidate budget is still a small
    /// constant; it does not grow with the candidate list.
    pub async fn validate(&self, candidate: &Candidate) -> Option<ValidatedProxy> {
        let client = match self.proxied_client(candidate) {
            Ok(client) => client,
            Err(e) => {
                debug!(candidate = %candidate, error = %e, "could not build proxied client");
                return None;
            }
        };

        // Confirm the claimed scheme first; a proxy that cannot tunnel TLS
        // may still serve plain HTTP.
        let mut schema = Schema::Http;
        let mut probe = None;
        if candidate.https {
            if let Some(hit) = self.probe_judge(&client, &self.config.https_judge_url).await {
                schema = Schema::Https;
                probe = Some(hit);
            }
        }
        if probe.is_none() {
            probe = self.probe_judge(&client, &self.config.judge_url).await;
        }

        let Some((body, latency)) = probe else {
            debug!(candidate = %candidate, "probe failed, dropping candidate");
            return None;
        };

        let report = JudgeReport::parse(&body);
        let anonymity = derive_anonymity(
            candidate.anonymity,
            report.as_ref(),
            self.client_ip.as_deref(),
        );

        // Independent of the reachability outcome.
        let google = self.probe_google(&client).await;

        let country = self
            .resolver
            .as_ref()
            .and_then(|r| r.country_code(&candidate.host))
            .or_else(|| candidate.country.clone());

        Some(ValidatedProxy {
            host: candidate.host.clone(),
            port: candidate.port,
            schema,
            country,
            anonymity,
            google,
            latency_ms: latency.as_millis() as u64,
            checked_at: Utc::now(),
        })
    }

    /// Probe candidates concurrently under the configured worker bound,
    /// returning the accepted proxies in validation-completion order.
    pub async fn validate_all(&self, candidates: Vec<Candidate>) -> Vec<ValidatedProxy> {
        let total = candidates.len();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        let validated: Vec<ValidatedProxy> = stream::iter(candidates)
            .map(|candidate| {
                let sem = Arc::clone(&semaphore);
                async move {
                    // Acquire only fails if the semaphore is closed, which
                    // cannot happen while we hold the Arc.
                    let _permit = sem.acquire().await.expect("Semaphore closed unexpectedly");
                    self.validate(&candidate).await
                }
            })
            .buffer_unordered(self.config.concurrency)
            .filter_map(|result| async move { result })
            .collect()
            .await;

        info!(
            probed = total,
            accepted = validated.len(),
            "candidate validation finished"
        );
        validated
    }

    /// Build a client that routes through the candidate.
    fn proxied_client(&self, candidate: &Candidate) -> Result<Client> {
        let proxy_url = format!("http://{}:{}", candidate.host, candidate.port);
        let proxy = ReqwestProxy::all(&proxy_url)?;

        let client = Client::builder()
            .proxy(proxy)
            .timeout(self.config.timeout)
            .build()?;

        Ok(client)
    }

    /// GET the judge through the proxy, bounded by the probe timeout.
    async fn probe_judge(&self, client: &Client, url: &str) -> Option<(String, Duration)> {
        let start = Instant::now();
        let response =
            match tokio::time::timeout(self.config.timeout, client.get(url).send()).await {
                Ok(Ok(response)) if response.status().is_success() => response,
                _ => return None,
            };
        let latency = start.elapsed();

        match tokio::time::timeout(self.config.timeout, response.text()).await {
            Ok(Ok(body)) => Some((body, latency)),
            _ => None,
        }
    }

    /// Secondary probe: does the proxy reach the google endpoint at all?
    async fn probe_google(&self, client: &Client) -> bool {
        matches!(
            tokio::time::timeout(self.config.timeout, client.get(&self.config.google_url).send())
                .await,
            Ok(Ok(response)) if response.status().is_success()
        )
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
