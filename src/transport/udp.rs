//! UDP transport for DNS queries.
//!
//! The listening side waits for datagrams with an idle bound so the server can
//! notice a quiet socket. Upstream queries each get their own ephemeral socket,
//! connected to the resolver so ICMP errors surface as transport errors.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::trace;

use super::MAX_DNS_PACKET_SIZE;
use crate::error::AttemptError;

/// Listening socket of one proxy session.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Wait at most `idle` for the next datagram.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    pub async fn recv(
        &self,
        buf: &mut [u8],
        idle: Duration,
    ) -> io::Result<Option<(usize, SocketAddr)>> {
        match timeout(idle, self.socket.recv_from(buf)).await {
            Ok(received) => received.map(Some),
            Err(_) => Ok(None),
        }
    }

    pub async fn send(&self, data: &[u8], addr: SocketAddr) -> io::Result<()> {
        self.socket.send_to(data, addr).await?;
        Ok(())
    }
}

/// Send one query to `server` and wait at most `limit` for a reply.
pub async fn exchange(
    server: SocketAddr,
    query: &[u8],
    limit: Duration,
) -> Result<Vec<u8>, AttemptError> {
    timeout(limit, exchange_inner(server, query))
        .await
        .map_err(|_| AttemptError::Timeout)?
}

async fn exchange_inner(server: SocketAddr, query: &[u8]) -> Result<Vec<u8>, AttemptError> {
    // Bind to ephemeral port (0 = OS assigns)
    let bind_addr: SocketAddr = if server.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(server).await?;
    socket.send(query).await?;
    trace!(server = %server, bytes_sent = query.len(), "Upstream query sent");

    let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];
    let len = socket.recv(&mut buf).await?;
    buf.truncate(len);
    trace!(server = %server, bytes_received = len, "Upstream reply received");

    Ok(buf)
}
