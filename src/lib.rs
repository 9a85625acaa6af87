//! dnsgate - a blacklisting UDP DNS proxy.
//!
//! Blacklisted names get NXDOMAIN. Everything else is resolved as A and AAAA
//! against an ordered list of upstream resolvers and returned as one answer.

pub mod config;
pub mod dns;
pub mod error;
pub mod filter;
pub mod forwarder;
pub mod proxy;
pub mod resolver;
pub mod stats;
pub mod transport;
