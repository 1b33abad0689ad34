//! Candidate parser module for extracting proxy candidates from raw source content
//!
//! Each source kind has its own expected document shape. Parsing is pure and
//! forgiving: a malformed row is skipped, a wholly malformed document yields
//! zero candidates, and missing optional columns become unknown hints rather
//! than parse failures.

use crate::proxy::fetcher::SourceKind;
use crate::proxy::models::{Anonymity, Candidate};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Regex pattern to match IP:PORT patterns in text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b").expect("Invalid IP:PORT regex")
});

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table tbody tr").expect("Invalid row selector"));

static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("Invalid cell selector"));

/// Candidate parser for turning raw source content into candidate records
pub struct CandidateParser;

impl CandidateParser {
    /// Parse raw content according to the source's expected shape.
    pub fn parse(kind: SourceKind, raw: &str) -> Vec<Candidate> {
        let candidates = match kind {
            SourceKind::ListingTable => Self::parse_listing_table(raw),
            SourceKind::PlainText => Self::parse_plain_text(raw),
        };

        // Sources change markup without notice; fall back to a raw IP:PORT
        // sweep before giving up on a document entirely.
        if candidates.is_empty() {
            return Self::extract_with_regex(raw);
        }

        candidates
    }

    /// Parse the tabular listing shape used by free-proxy-list.net and its
    /// sibling sites (sslproxies.org, us-proxy.org).
    ///
    /// Expected columns: IP, Port, Code, Country, Anonymity, Google, Https.
    /// Only IP and Port are required; the rest degrade to unknown hints.
    fn parse_listing_table(raw: &str) -> Vec<Candidate> {
        let document = Html::parse_document(raw);
        let mut candidates = Vec::new();

        for row in document.select(&ROW_SELECTOR) {
            let cells: Vec<String> = row
                .select(&CELL_SELECTOR)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .collect();

            if cells.len() < 2 {
                continue;
            }

            let host = cells[0].clone();
            if host.parse::<Ipv4Addr>().is_err() {
                continue;
            }
            let port: u16 = match cells[1].parse() {
                Ok(p) if p > 0 => p,
                _ => continue,
            };

            let country = cells.get(2).and_then(|c| Self::parse_country_code(c));
            let anonymity = cells.get(4).and_then(|c| Anonymity::from_hint(c));
            let https = cells
                .get(6)
                .map(|c| c.eq_ignore_ascii_case("yes"))
                .unwrap_or(false);

            candidates.push(Candidate::with_hints(host, port, country, anonymity, https));
        }

        candidates
    }

    /// Parse plain-text listings with one IP:PORT entry per line.
    fn parse_plain_text(raw: &str) -> Vec<Candidate> {
        raw.lines()
            .filter_map(Self::parse_plain_line)
            .collect()
    }

    /// Parse a single IP:PORT line; comments and blank lines yield `None`.
    fn parse_plain_line(line: &str) -> Option<Candidate> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let (host, port) = line.split_once(':')?;
        host.parse::<Ipv4Addr>().ok()?;
        let port: u16 = port.trim().parse().ok()?;
        if port == 0 {
            return None;
        }

        Some(Candidate::new(host.to_string(), port))
    }

    /// Extract candidates using regex pattern matching
    fn extract_with_regex(raw: &str) -> Vec<Candidate> {
        IP_PORT_REGEX
            .captures_iter(raw)
            .filter_map(|cap| {
                let host = cap.get(1)?.as_str();
                host.parse::<Ipv4Addr>().ok()?;
                let port: u16 = cap.get(2)?.as_str().parse().ok()?;
                if port == 0 {
                    return None;
                }
                Some(Candidate::new(host.to_string(), port))
            })
            .collect()
    }

    /// Normalize a source-reported country cell to a two-letter upper-case
    /// code, or `None` when the cell holds anything else.
    fn parse_country_code(cell: &str) -> Option<String> {
        let cell = cell.trim();
        if cell.len() == 2 && cell.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(cell.to_ascii_uppercase())
        } else {
            None
        }
    }

    /// Deduplicate candidates across sources by (host, port), keeping the
    /// first-seen entry's hints and preserving first-seen order.
    pub fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| seen.insert(c.key()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_FIXTURE: &str = r#"
<html><body>
<table class="table">
<thead><tr><th>IP Address</th><th>Port</th><th>Code</th><th>Country</th><th>Anonymity</th><th>Google</th><th>Https</th></tr></thead>
<tbody>
<tr><td>1.1.1.1</td><td>8888</td><td>US</td><td>United States</td><td>elite proxy</td><td>yes</td><td>yes</td></tr>
<tr><td>2.2.2.2</td><td>8080</td><td>US</td><td>United States</td><td>transparent</td><td>no</td><td>no</td></tr>
<tr><td>3.3.3.3</td><td>3128</td><td>GB</td><td>United Kingdom</td><td>anonymous</td><td>no</td><td>no</td></tr>
<tr><td>not-an-ip</td><td>80</td><td>DE</td><td>Germany</td><td>elite proxy</td><td>no</td><td>no</td></tr>
<tr><td>4.4.4.4</td><td>notaport</td><td>FR</td><td>France</td><td>elite proxy</td><td>no</td><td>no</td></tr>
</tbody>
</table>
</body></html>
"#;

    #[test]
    fn test_parse_listing_table() {
        let candidates = CandidateParser::parse(SourceKind::ListingTable, LISTING_FIXTURE);
        assert_eq!(candidates.len(), 3);

        assert_eq!(candidates[0].host, "1.1.1.1");
        assert_eq!(candidates[0].port, 8888);
        assert_eq!(candidates[0].country.as_deref(), Some("US"));
        assert_eq!(candidates[0].anonymity, Some(Anonymity::Elite));
        assert!(candidates[0].https);

        assert_eq!(candidates[1].anonymity, Some(Anonymity::Transparent));
        assert!(!candidates[1].https);

        assert_eq!(candidates[2].country.as_deref(), Some("GB"));
        assert_eq!(candidates[2].anonymity, Some(Anonymity::Anonymous));
    }

    #[test]
    fn test_parse_listing_table_is_deterministic() {
        let first = CandidateParser::parse(SourceKind::ListingTable, LISTING_FIXTURE);
        let second = CandidateParser::parse(SourceKind::ListingTable, LISTING_FIXTURE);
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_listing_table_missing_optional_columns() {
        let raw = r#"
<table><tbody>
<tr><td>5.5.5.5</td><td>3128</td></tr>
</tbody></table>
"#;
        let candidates = CandidateParser::parse(SourceKind::ListingTable, raw);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].country.is_none());
        assert!(candidates[0].anonymity.is_none());
        assert!(!candidates[0].https);
    }

    #[test]
    fn test_parse_plain_text() {
        let raw = r#"
# harvested proxies
192.168.1.1:8080
192.168.1.2:3128

10.0.0.1:1080
"#;
        let candidates = CandidateParser::parse(SourceKind::PlainText, raw);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].host, "192.168.1.1");
        assert_eq!(candidates[0].port, 8080);
    }

    #[test]
    fn test_parse_plain_line_invalid() {
        assert!(CandidateParser::parse_plain_line("").is_none());
        assert!(CandidateParser::parse_plain_line("# comment").is_none());
        assert!(CandidateParser::parse_plain_line("192.168.1.1").is_none());
        assert!(CandidateParser::parse_plain_line("192.168.1.1:abc").is_none());
        assert!(CandidateParser::parse_plain_line("999.1.1.1:8080").is_none());
        assert!(CandidateParser::parse_plain_line("192.168.1.1:0").is_none());
    }

    #[test]
    fn test_regex_fallback_on_unexpected_markup() {
        let raw = r#"
<html><body>
<div class="proxies">Fresh proxy 10.0.0.1:3128 checked just now</div>
<div class="proxies">Fresh proxy 10.0.0.2:8080 checked just now</div>
</body></html>
"#;
        let candidates = CandidateParser::parse(SourceKind::ListingTable, raw);
        assert_eq!(candidates.len(), 2);
        assert!(candidates
            .iter()
            .any(|c| c.host == "10.0.0.1" && c.port == 3128));
    }

    #[test]
    fn test_wholly_malformed_document_yields_nothing() {
        let candidates = CandidateParser::parse(SourceKind::ListingTable, "{ definitely: not html }");
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_dedupe_keeps_first_seen_hints() {
        let candidates = vec![
            Candidate::with_hints(
                "1.1.1.1".to_string(),
                8888,
                Some("US".to_string()),
                Some(Anonymity::Elite),
                true,
            ),
            Candidate::new("2.2.2.2".to_string(), 8080),
            Candidate::new("1.1.1.1".to_string(), 8888),
        ];

        let unique = CandidateParser::dedupe(candidates);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].host, "1.1.1.1");
        assert_eq!(unique[0].country.as_deref(), Some("US"));
        assert!(unique[0].https);
        assert_eq!(unique[1].host, "2.2.2.2");
    }

    #[test]
    fn test_parse_country_code() {
        assert_eq!(CandidateParser::parse_country_code("us"), Some("US".to_string()));
        assert_eq!(CandidateParser::parse_country_code(" GB "), Some("GB".to_string()));
        assert_eq!(CandidateParser::parse_country_code("USA"), None);
        assert_eq!(CandidateParser::parse_country_code(""), None);
        assert_eq!(CandidateParser::parse_country_code("1X"), None);
    }
}
