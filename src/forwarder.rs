//! Upstream forwarding with multi-server retry.
//!
//! Every round walks the whole upstream list in order. The first server that
//! answers both the A and the AAAA query wins; any failure moves on to the
//! next server after a fixed backoff.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::dns::{DnsQuery, DnsRecord, DnsResponse, TYPE_A, TYPE_AAAA};
use crate::error::{AttemptError, ForwardError};
use crate::transport::udp;

/// Retry limits for forwarding.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Rounds over the whole upstream list.
    pub attempts: usize,
    /// Bound on each A/AAAA exchange.
    pub timeout: Duration,
    /// Pause after a failed attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(5),
            backoff: Duration::from_secs(1),
        }
    }
}

/// Answers from one upstream for one record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamResult {
    pub rcode: u8,
    pub records: Vec<DnsRecord>,
}

impl UpstreamResult {
    /// Decode an upstream reply to the query with id `expected_id`.
    pub fn from_reply(reply: &[u8], expected_id: u16) -> Result<Self, AttemptError> {
        let response = DnsResponse::parse(reply)?;
        if response.id != expected_id {
            return Err(AttemptError::IdMismatch {
                expected: expected_id,
                got: response.id,
            });
        }

        Ok(Self {
            rcode: response.rcode(),
            records: response.answers,
        })
    }
}

/// Outcome of a successful forward.
#[derive(Debug, Clone)]
pub struct Forwarded {
    pub a: UpstreamResult,
    pub aaaa: UpstreamResult,
    /// The server that answered.
    pub server: SocketAddr,
    /// Time spent on the successful attempt.
    pub upstream_ms: f64,
}

/// Forwards queries to an ordered list of upstream resolvers.
pub struct UpstreamForwarder {
    upstreams: Vec<SocketAddr>,
    policy: RetryPolicy,
    failed_attempts: AtomicU64,
}

impl UpstreamForwarder {
    pub fn new(upstreams: Vec<SocketAddr>, policy: RetryPolicy) -> Self {
        Self {
            upstreams,
            policy,
            failed_attempts: AtomicU64::new(0),
        }
    }

    pub fn upstreams(&self) -> &[SocketAddr] {
        &self.upstreams
    }

    /// Failed attempts since the last call, for session stats.
    pub fn take_failed_attempts(&self) -> u64 {
        self.failed_attempts.swap(0, Ordering::Relaxed)
    }

    /// Resolve the query's name as A and AAAA.
    ///
    /// Contacts at most `attempts × upstreams` servers and stops at the first
    /// one that answers both record types.
    pub async fn forward(&self, query: &DnsQuery) -> Result<Forwarded, ForwardError> {
        let total = self.policy.attempts * self.upstreams.len();
        let mut tried = 0;

        for round in 1..=self.policy.attempts {
            for &server in &self.upstreams {
                tried += 1;
                let start = Instant::now();

                match self.attempt(query, server).await {
                    Ok((a, aaaa)) => {
                        let upstream_ms = start.elapsed().as_secs_f64() * 1000.0;
                        debug!(
                            domain = %query.domain,
                            server = %server,
                            round,
                            "Upstream answered"
                        );
                        return Ok(Forwarded {
                            a,
                            aaaa,
                            server,
                            upstream_ms,
                        });
                    }
                    Err(e) => {
                        self.failed_attempts.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            domain = %query.domain,
                            server = %server,
                            round,
                            error = %e,
                            "Upstream attempt failed, retrying"
                        );
                        if tried < total {
                            tokio::time::sleep(self.policy.backoff).await;
                        }
                    }
                }
            }
        }

        Err(ForwardError::Exhausted { attempts: tried })
    }

    /// One A and one AAAA exchange with `server`. Both must succeed.
    async fn attempt(
        &self,
        query: &DnsQuery,
        server: SocketAddr,
    ) -> Result<(UpstreamResult, UpstreamResult), AttemptError> {
        let a = query.for_upstream(rand::random(), TYPE_A);
        let aaaa = query.for_upstream(rand::random(), TYPE_AAAA);
        let timeout = self.policy.timeout;

        let (a_reply, aaaa_reply) = futures::future::try_join(
            udp::exchange(server, &a.to_bytes(), timeout),
            udp::exchange(server, &aaaa.to_bytes(), timeout),
        )
        .await?;

        Ok((
            UpstreamResult::from_reply(&a_reply, a.id)?,
            UpstreamResult::from_reply(&aaaa_reply, aaaa.id)?,
        ))
    }
}
