//! Data models for harvested and validated proxies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Proxy scheme enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    #[default]
    Http,
    Https,
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Http => write!(f, "http"),
            Schema::Https => write!(f, "https"),
        }
    }
}

/// Anonymity tier reported by sources and confirmed by probing.
///
/// Ordering is by how much of the requester's identity the proxy conceals:
/// `Transparent < Anonymous < Elite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Anonymity {
    #[default]
    Transparent,
    Anonymous,
    Elite,
}

impl Anonymity {
    /// Parse a source-reported anonymity label.
    ///
    /// Listing sites use labels like "elite proxy", "anonymous" or
    /// "transparent". Anything unrecognized yields `None` so the caller can
    /// treat the hint as absent rather than trusting a bogus value.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.trim().to_lowercase();
        if hint.contains("elite") || hint.contains("high") {
            Some(Anonymity::Elite)
        } else if hint.contains("anonymous") {
            Some(Anonymity::Anonymous)
        } else if hint.contains("transparent") {
            Some(Anonymity::Transparent)
        } else {
            None
        }
    }
}

impl fmt::Display for Anonymity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anonymity::Transparent => write!(f, "transparent"),
            Anonymity::Anonymous => write!(f, "anonymous"),
            Anonymity::Elite => write!(f, "elite"),
        }
    }
}

/// An unvalidated proxy record extracted from a scraped source.
///
/// Candidates only live between parsing and validation; whatever the
/// validator rejects is dropped, whatever it accepts is re-created as a
/// [`ValidatedProxy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
    /// Two-letter country code claimed by the source, if the listing had one.
    pub country: Option<String>,
    /// Anonymity tier claimed by the source, if the listing had one.
    pub anonymity: Option<Anonymity>,
    /// Whether the source claims the proxy supports HTTPS.
    pub https: bool,
}

impl Candidate {
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            country: None,
            anonymity: None,
            https: false,
        }
    }

    pub fn with_hints(
        host: String,
        port: u16,
        country: Option<String>,
        anonymity: Option<Anonymity>,
        https: bool,
    ) -> Self {
        Self {
            host,
            port,
            country,
            anonymity,
            https,
        }
    }

    /// Dedup key: candidates are identical when host and port match.
    pub fn key(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A proxy confirmed reachable and classified by the validator.
///
/// Uniquely identified by (host, port). Immutable once created: a stale
/// entry is replaced wholesale on the next refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedProxy {
    pub host: String,
    pub port: u16,
    pub schema: Schema,
    /// Best available country code: probe-confirmed when the geo lookup
    /// resolved, otherwise the source hint.
    pub country: Option<String>,
    pub anonymity: Anonymity,
    /// Whether the secondary google-compatibility probe succeeded.
    pub google: bool,
    /// Latency of the successful reachability probe.
    pub latency_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl ValidatedProxy {
    /// Render the proxy URL as `schema://host:port`.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.schema, self.host, self.port)
    }

    /// Get the proxy string in IP:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ValidatedProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_display() {
        assert_eq!(Schema::Http.to_string(), "http");
        assert_eq!(Schema::Https.to_string(), "https");
    }

    #[test]
    fn test_anonymity_order() {
        assert!(Anonymity::Transparent < Anonymity::Anonymous);
        assert!(Anonymity::Anonymous < Anonymity::Elite);
    }

    #[test]
    fn test_anonymity_from_hint() {
        assert_eq!(Anonymity::from_hint("elite proxy"), Some(Anonymity::Elite));
        assert_eq!(Anonymity::from_hint("Elite"), Some(Anonymity::Elite));
        assert_eq!(Anonymity::from_hint("anonymous"), Some(Anonymity::Anonymous));
        assert_eq!(
            Anonymity::from_hint(" Transparent "),
            Some(Anonymity::Transparent)
        );
        assert_eq!(Anonymity::from_hint("no idea"), None);
        assert_eq!(Anonymity::from_hint(""), None);
    }

    #[test]
    fn test_candidate_creation() {
        let candidate = Candidate::new("127.0.0.1".to_string(), 8080);
        assert_eq!(candidate.host, "127.0.0.1");
        assert_eq!(candidate.port, 8080);
        assert!(candidate.country.is_none());
        assert!(candidate.anonymity.is_none());
        assert!(!candidate.https);
    }

    #[test]
    fn test_candidate_key() {
        let a = Candidate::new("1.2.3.4".to_string(), 80);
        let b = Candidate::with_hints(
            "1.2.3.4".to_string(),
            80,
            Some("US".to_string()),
            Some(Anonymity::Elite),
            true,
        );
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_validated_proxy_url() {
        let proxy = ValidatedProxy {
            host: "1.1.1.1".to_string(),
            port: 8888,
            schema: Schema::Https,
            country: Some("US".to_string()),
            anonymity: Anonymity::Elite,
            google: true,
            latency_ms: 120,
            checked_at: Utc::now(),
        };
        assert_eq!(proxy.url(), "https://1.1.1.1:8888");
        assert_eq!(proxy.to_simple_string(), "1.1.1.1:8888");
    }
}
