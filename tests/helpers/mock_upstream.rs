use std::net::{Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dnsgate::dns::{CLASS_IN, DnsQuery, DnsRecord, DnsResponse, TYPE_A, TYPE_AAAA};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

pub const ANSWER_V4: [u8; 4] = [93, 184, 216, 34];

/// How a mock upstream treats incoming queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer A and AAAA queries with one record each.
    Answer,
    /// Never reply.
    Silent,
    /// Answer A queries only, ignore everything else.
    AnswerAOnly,
    /// Reply NXDOMAIN to everything.
    NxDomain,
}

/// UDP resolver on localhost that counts the datagrams it receives.
pub struct MockUpstream {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockUpstream {
    pub async fn start(behavior: Behavior) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        break;
                    }
                    result = socket.recv_from(&mut buf) => {
                        if let Ok((len, peer)) = result {
                            counter.fetch_add(1, Ordering::SeqCst);
                            if let Some(reply) = Self::build_reply(behavior, &buf[..len]) {
                                let _ = socket.send_to(&reply, peer).await;
                            }
                        }
                    }
                }
            }
        });

        Self {
            addr,
            hits,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Datagrams received so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn build_reply(behavior: Behavior, datagram: &[u8]) -> Option<Vec<u8>> {
        let query = DnsQuery::parse(datagram).ok()?;

        let response = match behavior {
            Behavior::Silent => return None,
            Behavior::NxDomain => DnsResponse::blocked(&query),
            Behavior::AnswerAOnly if query.qtype != TYPE_A => return None,
            Behavior::Answer | Behavior::AnswerAOnly => {
                let rdata = match query.qtype {
                    TYPE_A => ANSWER_V4.to_vec(),
                    TYPE_AAAA => {
                        Ipv6Addr::new(0x2606, 0x2800, 0x220, 1, 0x248, 0x1893, 0x25c8, 0x1946)
                            .octets()
                            .to_vec()
                    }
                    _ => return None,
                };
                DnsResponse {
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
                }
            }
        };

        Some(response.to_bytes())
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.local_addr().unwrap()
}

/// Send a query to the proxy and wait for its response.
pub async fn ask(proxy: SocketAddr, query: &DnsQuery, wait: Duration) -> Option<DnsResponse> {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(&query.to_bytes(), proxy).await.unwrap();

    let mut buf = [0u8; 4096];
    let (len, _) = tokio::time::timeout(wait, client.recv_from(&mut buf))
        .await
        .ok()?
        .unwrap();

    Some(DnsResponse::parse(&buf[..len]).unwrap())
}
