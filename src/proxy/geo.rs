//! Country lookup for cross-checking source-reported geo hints using MMDB

use crate::Result;
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Country resolver backed by an MMDB database.
///
/// Listing sites routinely mislabel proxy countries; when an MMDB file is
/// configured, the observed lookup result wins over the source hint.
pub struct CountryResolver {
    reader: Arc<Reader<Vec<u8>>>,
}

impl CountryResolver {
    /// Create a new resolver from an MMDB file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self {
            reader: Arc::new(reader),
        })
    }

    /// Look up the ISO 3166-1 alpha-2 country code for an IP address string.
    ///
    /// Returns `None` for unparseable addresses and addresses the database
    /// has no record for; the caller falls back to the source hint.
    pub fn country_code(&self, ip_str: &str) -> Option<String> {
        let ip: IpAddr = ip_str.parse().ok()?;
        self.country_code_for_ip(ip)
    }

    /// Look up the country code for an IpAddr
    pub fn country_code_for_ip(&self, ip: IpAddr) -> Option<String> {
        let lookup_result = self.reader.lookup(ip).ok()?;
        let country: Option<geoip2::Country> = lookup_result.decode().ok()?;
        country?.country.iso_code.map(String::from)
    }
}

impl Clone for CountryResolver {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
        }
    }
}
