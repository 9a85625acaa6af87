//! Benchmarks for UDP DNS request handling.
//!
//! Measures proxy performance end to end, with simulated upstream latency for
//! forwarded queries. Uses realistic latency based on public DNS benchmarks:
//! - Cloudflare (1.1.1.1): ~5-18ms average
//! - Google (8.8.8.8): ~7-24ms average
//! We simulate ~15ms average with ±5ms jitter.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::Rng;
use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::runtime::Runtime;

use dnsgate::config::ProxyConfig;
use dnsgate::dns::{CLASS_IN, DnsQuery, DnsRecord, DnsResponse, TYPE_A};
use dnsgate::proxy::ProxyServer;
use dnsgate::transport::MAX_DNS_PACKET_SIZE;

const PROXY_PORT: u16 = 15355;
const UPSTREAM_ADDR: &str = "127.0.0.1:15357";

/// Simulated upstream latency (based on real-world DNS benchmarks)
const BASE_LATENCY_MS: u64 = 15;
const JITTER_MS: u64 = 5;

/// Simulate realistic upstream latency with jitter
async fn simulate_upstream_latency() {
    let jitter = rand::rng().random_range(0..=JITTER_MS * 2);
    let latency = BASE_LATENCY_MS - JITTER_MS + jitter;
    tokio::time::sleep(Duration::from_millis(latency)).await;
}

fn build_reply(datagram: &[u8]) -> Option<Vec<u8>> {
    let query = DnsQuery::parse(datagram).ok()?;
    let rdata = if query.qtype == TYPE_A {
        vec![93, 184, 216, 34]
    } else {
        vec![
            0x26, 0x06, 0x28, 0x00, 0x02, 0x20, 0, 1, 0x02, 0x48, 0x18, 0x93, 0x25, 0xc8, 0x19,
            0x46,
        ]
    };

    let response = DnsResponse {
        id: query.id,
        flags: 0x8180,
        questions: vec![query.question()],
        answers: vec![DnsRecord {
            name: query.name.clone(),
            rtype: query.qtype,
            class: CLASS_IN,
            ttl: 300,
            rdata,
        }],
    };
    Some(response.to_bytes())
}

/// Mock UDP upstream with simulated latency
async fn mock_udp_upstream(socket: UdpSocket) {
    let socket = std::sync::Arc::new(socket);
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];
    loop {
        if let Ok((len, src)) = socket.recv_from(&mut buf).await {
            let Some(reply) = build_reply(&buf[..len]) else {
                continue;
            };
            let socket = socket.clone();
            tokio::spawn(async move {
                simulate_upstream_latency().await;
                let _ = socket.send_to(&reply, src).await;
            });
        }
    }
}

fn start_udp_mock_upstream() {
    let upstream_addr: SocketAddr = UPSTREAM_ADDR.parse().unwrap();

    std::thread::spawn(move || {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let socket = UdpSocket::bind(upstream_addr).await.unwrap();
            mock_udp_upstream(socket).await;
        });
    });

    std::thread::sleep(Duration::from_millis(50));
}

fn start_udp_proxy() {
    let mut blacklist = tempfile::NamedTempFile::new().unwrap();
    blacklist.write_all(b"ads.example.com::127.0.0.1\n").unwrap();

    let mut config = ProxyConfig::new(
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, PROXY_PORT),
        vec![UPSTREAM_ADDR.parse().unwrap()],
        blacklist.path(),
    );
    config.idle_timeout = Duration::from_secs(3600);

    std::thread::spawn(move || {
        let _blacklist = blacklist;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let local = tokio::task::LocalSet::new();
        let server = ProxyServer::new(config);

        local.block_on(&rt, server.run());
    });

    std::thread::sleep(Duration::from_millis(50));
}

async fn request(proxy_addr: SocketAddr, domain: &str) -> usize {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let query = DnsQuery::new(0x1234, domain, TYPE_A).to_bytes();
    client.send_to(&query, proxy_addr).await.unwrap();

    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];
    tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
        .await
        .unwrap()
        .unwrap()
        .0
}

fn bench_udp_request(c: &mut Criterion) {
    start_udp_mock_upstream();
    start_udp_proxy();

    let rt = Runtime::new().unwrap();
    let proxy_addr: SocketAddr = (Ipv4Addr::LOCALHOST, PROXY_PORT).into();

    let mut group = c.benchmark_group("udp");
    group.throughput(Throughput::Elements(1));

    group.bench_function(BenchmarkId::new("request_handling", "blocked"), |b| {
        b.to_async(&rt)
            .iter(|| async { request(proxy_addr, "ads.example.com").await });
    });

    group.bench_function(BenchmarkId::new("request_handling", "forwarded"), |b| {
        b.to_async(&rt)
            .iter(|| async { request(proxy_addr, "www.example.com").await });
    });

    group.finish();
}

criterion_group!(benches, bench_udp_request);
criterion_main!(benches);
