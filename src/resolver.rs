//! DNS query resolution logic.
//!
//! Handles the decision step of the query pipeline:
//! 1. Filter (blacklisted domains get NXDOMAIN)
//! 2. Otherwise forward to upstream
//!
//! Transports handle the actual I/O, the resolver handles decisions.

use std::sync::Arc;

use crate::dns::{DnsQuery, DnsResponse};
use crate::filter::{Blacklist, filter_query};

/// Action to take for a DNS query.
pub enum QueryAction<'a> {
    /// Query is blocked, return this response immediately.
    Blocked {
        response: DnsResponse,
        marker: &'a str,
    },
    /// Query should be forwarded to upstream.
    Forward,
}

/// Resolver holds one session's blacklist snapshot and decides what to do
/// with each query.
pub struct Resolver {
    blacklist: Arc<Blacklist>,
}

impl Resolver {
    /// Create a new resolver with the given blacklist.
    pub fn new(blacklist: Arc<Blacklist>) -> Self {
        Self { blacklist }
    }

    /// Process a DNS query and decide what action to take.
    pub fn process_query(&self, query: &DnsQuery) -> QueryAction<'_> {
        match filter_query(&self.blacklist, query) {
            Some((marker, response)) => QueryAction::Blocked { response, marker },
            None => QueryAction::Forward,
        }
    }

    /// Returns the number of domains in the blacklist.
    pub fn blocked_count(&self) -> usize {
        self.blacklist.len()
    }
}
