//! Proxy configuration.
//!
//! Built once at startup and handed to the server by value.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::forwarder::RetryPolicy;

/// Port used for upstreams given without one.
pub const DNS_PORT: u16 = 53;

/// What a failed request tears down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RestartScope {
    /// End the listening session: new socket, reloaded blacklist.
    #[default]
    Session,
    /// Drop only the failed request and keep listening.
    Request,
}

/// Configuration for the DNS proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Local address to listen on (IPv4 only)
    pub listen: SocketAddrV4,
    /// Upstream resolvers, tried in order
    pub upstreams: Vec<SocketAddr>,
    /// Blacklist file, reloaded at the start of every session
    pub blacklist_path: PathBuf,
    pub retry: RetryPolicy,
    /// A session with no datagram for this long is restarted
    pub idle_timeout: Duration,
    /// Pause before retrying a session that failed to start
    pub restart_delay: Duration,
    pub restart_scope: RestartScope,
}

impl ProxyConfig {
    pub fn new(
        listen: SocketAddrV4,
        upstreams: Vec<SocketAddr>,
        blacklist_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            listen,
            upstreams,
            blacklist_path: blacklist_path.into(),
            retry: RetryPolicy::default(),
            idle_timeout: Duration::from_secs(5),
            restart_delay: Duration::from_secs(1),
            restart_scope: RestartScope::default(),
        }
    }

    /// Check the settings the server cannot run without.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.upstreams.is_empty() {
            return Err(ConfigError::NoUpstreams);
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(self)
    }
}

/// Parse an upstream as `ip` or `ip:port`.
pub fn parse_upstream(s: &str) -> Result<SocketAddr, String> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    s.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<std::net::IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| format!("invalid upstream address: {s}"))
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self::new(
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, DNS_PORT),
            vec![
                SocketAddr::new(Ipv4Addr::new(8, 8, 8, 8).into(), DNS_PORT),
                SocketAddr::new(Ipv4Addr::new(8, 8, 4, 4).into(), DNS_PORT),
            ],
            "blacklist.txt",
        )
    }
}
