//! Statistics tracking for the DNS proxy.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for one listening session.
pub struct Stats {
    pub requests: AtomicU64,
    pub forwarded: AtomicU64,
    pub blocked: AtomicU64,
    pub dropped: AtomicU64,
    /// Failed upstream attempts, including those later recovered by failover.
    pub upstream_failures: AtomicU64,
    /// Cumulative response time in microseconds for averaging.
    total_response_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
        }
    }

    pub fn record_forwarded(&self, response_time_ms: f64) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.record_request(response_time_ms);
    }

    pub fn record_blocked(&self, response_time_ms: f64) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
        self.record_request(response_time_ms);
    }

    pub fn record_dropped(&self, response_time_ms: f64) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.record_request(response_time_ms);
    }

    pub fn record_upstream_failures(&self, count: u64) {
        self.upstream_failures.fetch_add(count, Ordering::Relaxed);
    }

    fn record_request(&self, response_time_ms: f64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add((response_time_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let requests = self.requests.swap(0, Ordering::Relaxed);
        let forwarded = self.forwarded.swap(0, Ordering::Relaxed);
        let blocked = self.blocked.swap(0, Ordering::Relaxed);
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        let upstream_failures = self.upstream_failures.swap(0, Ordering::Relaxed);
        let total_us = self.total_response_time_us.swap(0, Ordering::Relaxed);

        let avg_response_ms = if requests > 0 {
            (total_us as f64 / requests as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            requests,
            forwarded,
            blocked,
            dropped,
            upstream_failures,
            avg_response_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub forwarded: u64,
    pub blocked: u64,
    pub dropped: u64,
    pub upstream_failures: u64,
    pub avg_response_ms: f64,
}
