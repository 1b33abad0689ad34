use clap::{Parser, Subcommand};
use proxy_pool::{
    FetcherConfig, ProxyPool, QueryCriteria, RefreshConfig, Refresher, SourceFetcher, Validator,
    ValidatorConfig,
};
use proxy_pool::{query_config, query_list, query_single};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// A free proxy harvester, validator and filterable pool
#[derive(Parser)]
#[command(name = "proxy-pool")]
#[command(about = "Harvest, validate and query free HTTP/HTTPS proxies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Per-probe validation timeout in seconds
    #[arg(long, default_value = "1.0", global = true)]
    timeout: f64,

    /// Number of concurrent validation probes
    #[arg(long, default_value = "50", global = true)]
    concurrency: usize,

    /// Path to an MMDB file for country cross-checks
    #[arg(long, global = true)]
    mmdb: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one refresh cycle and print the validated pool
    Refresh,
    /// Refresh once, then run a query against the pool
    Query {
        /// Country code filter (e.g. US, GB)
        #[arg(long)]
        country: Option<String>,
        /// Randomize selection order
        #[arg(long)]
        random: bool,
        /// Only anonymous-or-better proxies
        #[arg(long)]
        anonymous: bool,
        /// Only elite proxies
        #[arg(long)]
        elite: bool,
        /// Only HTTPS proxies
        #[arg(long)]
        https: bool,
        /// Filter by google compatibility (true/false; unset ignores the flag)
        #[arg(long)]
        google: Option<bool>,
        /// Maximum number of proxies to return (clamped to 1-100)
        #[arg(long, default_value = "10")]
        limit: i64,
        /// Return a list instead of a single proxy
        #[arg(long)]
        list: bool,
        /// Return client configuration shapes instead of a single proxy
        #[arg(long)]
        config: bool,
    },
    /// Refresh on a schedule until interrupted
    Watch {
        /// Seconds between refresh cycles
        #[arg(long, default_value = "600")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> proxy_pool::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut validator_config = ValidatorConfig::new()
        .with_timeout_secs(cli.timeout)
        .with_concurrency(cli.concurrency);
    if let Some(mmdb) = &cli.mmdb {
        validator_config = validator_config.with_mmdb_path(mmdb.clone());
    }

    let fetcher = SourceFetcher::with_config(FetcherConfig::new())?;
    let mut validator = Validator::with_config(validator_config);
    validator.detect_client_ip().await;

    let pool = Arc::new(ProxyPool::new());
    let sources = SourceFetcher::default_sources();

    match cli.command {
        Commands::Refresh => {
            let refresher = Refresher::new(fetcher, validator, Arc::clone(&pool), sources);
            let installed = refresher.refresh_once().await;
            println!("Validated {} proxies", installed);
            for proxy in &pool.current().proxies {
                println!(
                    "  {} [{} {} {}ms]",
                    proxy.url(),
                    proxy.country.as_deref().unwrap_or("--"),
                    proxy.anonymity,
                    proxy.latency_ms
                );
            }
        }
        Commands::Query {
            country,
            random,
            anonymous,
            elite,
            https,
            google,
            limit,
            list,
            config,
        } => {
            let refresher = Refresher::new(fetcher, validator, Arc::clone(&pool), sources);
            refresher.refresh_once().await;

            let mut criteria = QueryCriteria::new()
                .with_random(random)
                .with_anonymous(anonymous)
                .with_elite(elite)
                .with_https(https)
                .with_limit(limit);
            if let Some(country) = &country {
                criteria = criteria.with_country(country);
            }
            if let Some(google) = google {
                criteria = criteria.with_google(google);
            }

            if list {
                let response = query_list(&pool, &criteria);
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else if config {
                match query_config(&pool, &criteria) {
                    Some(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                    None => println!("No proxy matched the criteria"),
                }
            } else {
                match query_single(&pool, &criteria) {
                    Some(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                    None => println!("No proxy matched the criteria"),
                }
            }

            let health = pool.health();
            eprintln!("pool size: {}", health.size);
        }
        Commands::Watch { interval } => {
            let config = RefreshConfig::new().with_interval(Duration::from_secs(interval));
            let refresher =
                Refresher::with_config(fetcher, validator, Arc::clone(&pool), sources, config);
            refresher.run().await;
        }
    }

    Ok(())
}
