use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dnsgate::config::{ProxyConfig, RestartScope, parse_upstream};
use dnsgate::forwarder::RetryPolicy;
use dnsgate::proxy::ProxyServer;

#[derive(Parser)]
#[command(name = "dnsgate")]
#[command(about = "Blacklisting UDP DNS proxy", long_about = None)]
struct Args {
    /// Local port to listen on
    #[arg(short, long, default_value = "53")]
    port: u16,

    /// Bind address (IPv4)
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: Ipv4Addr,

    /// Upstream DNS server (ip or ip:port), tried in the given order
    #[arg(
        short,
        long = "upstream",
        value_parser = parse_upstream,
        default_values = ["8.8.8.8", "8.8.4.4"]
    )]
    upstreams: Vec<SocketAddr>,

    /// Blacklist file with one `domain::marker` entry per line
    #[arg(short = 'l', long, default_value = "blacklist.txt")]
    blacklist: PathBuf,

    /// Rounds over the upstream list before a query fails
    #[arg(long, default_value = "3")]
    attempts: usize,

    /// Timeout for each upstream query, in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    /// Pause after a failed upstream attempt, in milliseconds
    #[arg(long, default_value = "1000")]
    backoff_ms: u64,

    /// Restart the session after this long without queries, in milliseconds
    #[arg(long, default_value = "5000")]
    idle_timeout_ms: u64,

    /// Pause before retrying a session that failed to start, in milliseconds
    #[arg(long, default_value = "1000")]
    restart_delay_ms: u64,

    /// What a failed request tears down
    #[arg(long, value_enum, default_value_t = RestartScope::Session)]
    restart_scope: RestartScope,

    /// Log every forwarded query
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> ProxyConfig {
        let mut config = ProxyConfig::new(
            SocketAddrV4::new(self.bind, self.port),
            self.upstreams,
            self.blacklist,
        );
        config.retry = RetryPolicy {
            attempts: self.attempts,
            timeout: Duration::from_millis(self.timeout_ms),
            backoff: Duration::from_millis(self.backoff_ms),
        };
        config.idle_timeout = Duration::from_millis(self.idle_timeout_ms);
        config.restart_delay = Duration::from_millis(self.restart_delay_ms);
        config.restart_scope = self.restart_scope;
        config
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match args.into_config().validate() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Starting dnsgate v{} on {}",
        env!("CARGO_PKG_VERSION"),
        config.listen
    );

    let server = ProxyServer::new(config);
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, server.run());

    ExitCode::SUCCESS
}
