//! DNS proxy orchestration.
//!
//! The server runs listening sessions back to back. Each session loads a fresh
//! blacklist snapshot and binds a new socket, then handles one datagram at a
//! time until the socket stays idle for the configured interval or a request
//! fails in a way the restart scope does not absorb.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::{ProxyConfig, RestartScope};
use crate::dns::{DnsQuery, DnsResponse, MAX_UDP_RESPONSE};
use crate::error::ProxyError;
use crate::filter::Blacklist;
use crate::forwarder::UpstreamForwarder;
use crate::resolver::{QueryAction, Resolver};
use crate::stats::Stats;
use crate::transport::udp::UdpTransport;
use crate::transport::{MAX_DNS_PACKET_SIZE, QueryLogger};

/// Why a session ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// No datagram arrived within the idle timeout.
    Idle,
}

/// The DNS proxy server.
pub struct ProxyServer {
    config: ProxyConfig,
    forwarder: Arc<UpstreamForwarder>,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig) -> Self {
        let forwarder = Arc::new(UpstreamForwarder::new(config.upstreams.clone(), config.retry));

        Self { config, forwarder }
    }

    /// Run the DNS proxy. Runs indefinitely.
    ///
    /// Idle timeouts and session errors both lead to a new session with a
    /// reloaded blacklist and a new socket.
    pub async fn run(&self) {
        loop {
            let session = match self.start_session().await {
                Ok(session) => session,
                Err(e) => {
                    error!(error = %e, "Failed to start session, retrying");
                    tokio::time::sleep(self.config.restart_delay).await;
                    continue;
                }
            };

            match session.serve().await {
                Ok(SessionEnd::Idle) => {
                    info!("No data received within the idle timeout, restarting session")
                }
                Err(e) => error!(error = %e, "Unexpected error, restarting session"),
            }
        }
    }

    /// Load the blacklist and bind the listening socket for a new session.
    pub async fn start_session(&self) -> Result<Session, ProxyError> {
        let blacklist = Blacklist::load(&self.config.blacklist_path)?;
        let transport = UdpTransport::bind(SocketAddr::V4(self.config.listen)).await?;
        let resolver = Resolver::new(Arc::new(blacklist));

        let listen = transport.local_addr()?;
        let upstreams: Vec<_> = self.forwarder.upstreams().iter().map(|a| a.to_string()).collect();
        info!(
            listen = %listen,
            blocked = resolver.blocked_count(),
            upstreams = %upstreams.join(", "),
            "DNS proxy listening"
        );

        Ok(Session {
            transport,
            resolver,
            forwarder: Arc::clone(&self.forwarder),
            stats: Stats::new(),
            idle_timeout: self.config.idle_timeout,
            restart_scope: self.config.restart_scope,
        })
    }
}

/// One listening session: a blacklist snapshot and a bound socket.
pub struct Session {
    transport: UdpTransport,
    resolver: Resolver,
    forwarder: Arc<UpstreamForwarder>,
    stats: Stats,
    idle_timeout: Duration,
    restart_scope: RestartScope,
}

impl Session {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle queries until the socket goes idle or a request fails.
    ///
    /// The socket is closed when the session is dropped.
    pub async fn serve(self) -> Result<SessionEnd, ProxyError> {
        let result = self.listen().await;

        self.stats.record_upstream_failures(self.forwarder.take_failed_attempts());
        let stats = self.stats.snapshot_and_reset();
        info!(
            requests = stats.requests,
            forwarded = stats.forwarded,
            blocked = stats.blocked,
            dropped = stats.dropped,
            upstream_failures = stats.upstream_failures,
            avg_response_ms = stats.avg_response_ms,
            "[stats] session ended"
        );

        result
    }

    async fn listen(&self) -> Result<SessionEnd, ProxyError> {
        let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

        loop {
            let Some((len, client)) = self.transport.recv(&mut buf, self.idle_timeout).await? else {
                return Ok(SessionEnd::Idle);
            };

            debug!(client = %client, bytes = len, "Received query");
            let logger = QueryLogger::start(client);

            match self.handle(&buf[..len], client, &logger).await {
                Ok(()) => {}
                Err(e) if e.is_request_scoped() && self.restart_scope == RestartScope::Request => {
                    self.stats.record_dropped(logger.dropped(&e));
                }
                Err(e) => {
                    self.stats.record_dropped(logger.elapsed_ms());
                    return Err(e);
                }
            }
        }
    }

    async fn handle(
        &self,
        datagram: &[u8],
        client: SocketAddr,
        logger: &QueryLogger,
    ) -> Result<(), ProxyError> {
        let query = DnsQuery::parse(datagram)?;

        match self.resolver.process_query(&query) {
            QueryAction::Blocked { response, marker } => {
                self.transport
                    .send(&response.encode(MAX_UDP_RESPONSE), client)
                    .await?;
                self.stats.record_blocked(logger.blocked(&query.domain, marker));
            }
            QueryAction::Forward => {
                let forwarded = self.forwarder.forward(&query).await?;
                let response = DnsResponse::merged(&query, &forwarded.a, &forwarded.aaaa);
                self.transport
                    .send(&response.encode(MAX_UDP_RESPONSE), client)
                    .await?;
                self.stats.record_forwarded(logger.forwarded(
                    &query.domain,
                    response.answers.len(),
                    forwarded.upstream_ms,
                    forwarded.server,
                ));
            }
        }

        Ok(())
    }
}
