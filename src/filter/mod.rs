//! DNS query filtering module.
//!
//! Decides whether a query is blacklisted and, if so, produces the
//! non-existent-domain response returned instead of forwarding it.

mod blacklist;

pub use blacklist::Blacklist;

use crate::dns::{DnsQuery, DnsResponse};

/// Check if a DNS query should be blocked and return the response for it.
///
/// Returns `Some((marker, response))` if the query's domain or one of its
/// parents is blacklisted, `None` if it should be forwarded to upstream.
pub fn filter_query<'a>(
    blacklist: &'a Blacklist,
    query: &DnsQuery,
) -> Option<(&'a str, DnsResponse)> {
    let marker = blacklist.matches(&query.domain)?;
    Some((marker, DnsResponse::blocked(query)))
}
