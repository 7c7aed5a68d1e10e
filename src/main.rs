use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use geofix::location::{
    default_chain, FileStore, HttpJsonClient, IpApiClient, LocateOptions, LocationResolver,
    LocationResponse, ProviderClient, ResolverConfig, SystemClock, UnavailableClient,
};
use geofix::logging::init_logging;

/// geofix — resolve the current position through the provider fallback chain.
///
/// Prints the result as JSON on stdout; diagnostics go to stderr.
///
/// Examples:
///   geofix
///   geofix --force-refresh
///   geofix --primary-url http://localhost:8080/fix --state-dir /tmp/geofix
#[derive(Parser)]
#[command(name = "geofix", version, about, long_about = None)]
struct Cli {
    /// Ignore the cached fix and query providers.
    #[arg(long, short = 'f')]
    force_refresh: bool,

    /// Directory for breaker and cache state. Defaults to ~/.geofix.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// JSON config file. Missing keys keep their defaults.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Primary network provider endpoint (overrides the config file).
    #[arg(long)]
    primary_url: Option<String>,

    /// Default log level when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = match &cli.config {
        Some(path) => ResolverConfig::load_from(path).unwrap_or_else(|e| {
            eprintln!("Error: {}: {}", path.display(), e);
            std::process::exit(2);
        }),
        None => ResolverConfig::default(),
    };
    if let Some(url) = cli.primary_url {
        config.primary_endpoint = Some(url);
    }

    let store = match cli.state_dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::open_default(),
    };

    let primary: Arc<dyn ProviderClient> = match &config.primary_endpoint {
        Some(url) => Arc::new(HttpJsonClient::new(url.clone())),
        None => Arc::new(UnavailableClient::new("no primary provider endpoint configured")),
    };
    let device: Arc<dyn ProviderClient> =
        Arc::new(UnavailableClient::new("no location sensor on this host"));
    let ip: Arc<dyn ProviderClient> = Arc::new(IpApiClient::new(config.ip_endpoint.clone()));

    let chain = default_chain(primary, device, ip, &config, Arc::new(SystemClock));
    let resolver = LocationResolver::new(chain, Arc::new(store), &config);

    let result = resolver
        .get_current_location(LocateOptions {
            force_refresh: cli.force_refresh,
        })
        .await;

    match &result {
        Ok(res) => eprintln!("  \u{1F4CD} {}", res.fix.display_line()),
        Err(e) => eprintln!("Error: {}", e),
    }
    let failed = result.is_err();

    let response = LocationResponse::from(result);
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: cannot encode response: {}", e),
    }
    if failed {
        std::process::exit(1);
    }
}
