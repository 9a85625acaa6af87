//! Transport layer for the DNS proxy.
//!
//! UDP only: the listening socket clients talk to, and the one-shot
//! exchanges used to query upstream resolvers.

pub mod udp;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

use std::net::SocketAddr;
use std::time::Instant;

use tracing::{debug, info, warn};

/// Logger for the outcome of one client query.
///
/// Created when the datagram arrives so every outcome carries the total time
/// spent on the request.
pub struct QueryLogger {
    client: SocketAddr,
    start: Instant,
}

impl QueryLogger {
    pub fn start(client: SocketAddr) -> Self {
        Self {
            client,
            start: Instant::now(),
        }
    }

    /// Milliseconds since the query arrived.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn blocked(&self, domain: &str, marker: &str) -> f64 {
        let elapsed_ms = self.elapsed_ms();
        info!(
            client = %self.client,
            domain,
            marker,
            total_ms = elapsed_ms,
            "BLOCKED"
        );
        elapsed_ms
    }

    pub fn forwarded(
        &self,
        domain: &str,
        answers: usize,
        upstream_ms: f64,
        from: SocketAddr,
    ) -> f64 {
        let elapsed_ms = self.elapsed_ms();
        debug!(
            client = %self.client,
            domain,
            answers,
            upstream = %from,
            total_ms = elapsed_ms,
            upstream_ms,
            "FORWARDED"
        );
        elapsed_ms
    }

    pub fn dropped(&self, error: &dyn std::error::Error) -> f64 {
        let elapsed_ms = self.elapsed_ms();
        warn!(
            client = %self.client,
            error = %error,
            total_ms = elapsed_ms,
            "DROPPED"
        );
        elapsed_ms
    }
}
