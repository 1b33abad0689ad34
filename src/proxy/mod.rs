//! Proxy module for harvesting, validating and querying free proxies
//!
//! This module provides functionality for:
//! - Fetching raw proxy listings from configured web sources
//! - Parsing per-source document shapes into candidate records
//! - Probing candidates for liveness, scheme and anonymity under a time budget
//! - Holding the validated pool as an atomically swapped snapshot
//! - Filtering the snapshot per caller-specified criteria

pub mod fetcher;
pub mod geo;
pub mod models;
pub mod parser;
pub mod pool;
pub mod query;
pub mod refresh;
pub mod validator;

pub use fetcher::{FetchOutcome, FetcherConfig, Source, SourceFetcher, SourceKind};
pub use geo::CountryResolver;
pub use models::{Anonymity, Candidate, Schema, ValidatedProxy};
pub use parser::CandidateParser;
pub use pool::{PoolHealth, PoolSnapshot, ProxyPool};
pub use query::{
    query_config, query_list, query_single, ProxyConfigResponse, ProxyListResponse, ProxyResponse,
    QueryCriteria,
};
pub use refresh::{RefreshConfig, Refresher};
pub use validator::{derive_anonymity, JudgeReport, Validator, ValidatorConfig};
