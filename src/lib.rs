//! Proxy Pool - Free Proxy Harvester and Query Pool
//!
//! Harvests publicly listed HTTP/HTTPS proxies from scraped web sources,
//! validates their liveness, scheme and anonymity under a time budget, and
//! exposes the validated pool through filterable query operations.

pub mod proxy;

pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
