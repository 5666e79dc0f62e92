//! UDP transport: connected socket ownership and the response reader.
//!
//! Each connected client owns one ephemeral-port UDP socket that is
//! `connect()`ed to the agent, so the kernel discards datagrams from any
//! other source. A single background reader decodes responses and wakes
//! the pending slot keyed by request-id; writes happen on the caller's
//! task.

pub(crate) mod pending;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ber::MAX_MESSAGE_LEN;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::metrics::Metrics;
use crate::version::Version;
use pending::PendingTable;

/// One connection epoch: a socket plus its reader's shutdown token.
///
/// Reconnecting replaces the whole `Conn`; a reader from a previous epoch
/// can never deliver into the new one because its token is cancelled
/// before the swap.
pub(crate) struct Conn {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    local: SocketAddr,
    shutdown: CancellationToken,
}

impl Conn {
    /// Bind an ephemeral local port and connect it to the agent.
    pub(crate) async fn connect(peer: SocketAddr) -> io::Result<Self> {
        let socket = bind_ephemeral_socket(peer).await?;
        socket.connect(peer).await?;
        let local = socket.local_addr()?;

        Ok(Self {
            socket: Arc::new(socket),
            peer,
            local,
            shutdown: CancellationToken::new(),
        })
    }

    /// The agent address.
    pub(crate) fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// The local bind address.
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Write one datagram to the agent.
    pub(crate) async fn send(&self, data: &[u8]) -> Result<()> {
        self.socket
            .send(data)
            .await
            .map_err(|e| Error::io(self.peer, e))?;
        Ok(())
    }

    /// Stop the reader task.
    pub(crate) fn close(&self) {
        self.shutdown.cancel();
    }

    /// Spawn the background reader.
    ///
    /// The reader decodes each datagram, validates the version, and wakes
    /// the pending slot for its request-id. Responses with no slot are
    /// dropped and counted as spurious. On a socket error the reader fails
    /// every pending slot with `ConnectionLost` and hands the error to
    /// `on_lost` exactly once.
    pub(crate) fn spawn_reader(
        &self,
        pending: Arc<PendingTable>,
        metrics: Arc<Metrics>,
        expected_version: Version,
        on_lost: impl FnOnce(Error) + Send + 'static,
    ) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let shutdown = self.shutdown.clone();
        let peer = self.peer;

        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_MESSAGE_LEN];

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        tracing::debug!(target: "edgesnmp::transport", peer = %peer, "reader stopped");
                        return;
                    }

                    result = socket.recv(&mut buf) => {
                        match result {
                            Ok(len) => {
                                dispatch_datagram(
                                    &buf[..len],
                                    peer,
                                    &pending,
                                    &metrics,
                                    expected_version,
                                );
                            }
                            Err(_) if shutdown.is_cancelled() => return,
                            Err(e) => {
                                tracing::warn!(
                                    target: "edgesnmp::transport",
                                    peer = %peer,
                                    error = %e,
                                    "socket error, connection lost"
                                );
                                pending.fail_all(|| Error::ConnectionLost { target: peer });
                                on_lost(Error::io(peer, e));
                                return;
                            }
                        }
                    }
                }
            }
        })
    }
}

/// Decode one datagram and wake its pending slot.
fn dispatch_datagram(
    data: &[u8],
    peer: SocketAddr,
    pending: &PendingTable,
    metrics: &Metrics,
    expected_version: Version,
) {
    let message = match Message::decode(Bytes::copy_from_slice(data)) {
        Ok(msg) => msg,
        Err(e) => {
            metrics.errors.incr();
            tracing::warn!(
                target: "edgesnmp::transport",
                peer = %peer,
                error = %e,
                bytes = data.len(),
                "failed to decode response"
            );
            return;
        }
    };

    if message.version != expected_version {
        metrics.errors.incr();
        tracing::warn!(
            target: "edgesnmp::transport",
            peer = %peer,
            expected = %expected_version,
            actual = %message.version,
            "version mismatch in response"
        );
        return;
    }

    let pdu = message.into_pdu();
    let request_id = pdu.request_id;
    let varbind_count = pdu.varbinds.len();

    metrics.responses_received.incr();
    metrics.varbinds_received.add(varbind_count as u64);

    if !pending.complete(request_id, Ok(pdu)) {
        metrics.spurious_responses.incr();
        tracing::debug!(
            target: "edgesnmp::transport",
            peer = %peer,
            request_id,
            "response for unknown request, dropping"
        );
    }
}

/// Bind an ephemeral UDP socket in the target's address family.
///
/// socket2 is used so reuse-address and v6-only are set before the bind,
/// then the socket is handed to tokio.
async fn bind_ephemeral_socket(peer: SocketAddr) -> io::Result<UdpSocket> {
    let (domain, bind_addr): (Domain, SocketAddr) = if peer.is_ipv6() {
        (Domain::IPV6, "[::]:0".parse().unwrap())
    } else {
        (Domain::IPV4, "0.0.0.0:0".parse().unwrap())
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if peer.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&bind_addr.into())?;

    UdpSocket::from_std(socket.into())
}

/// Bind a UDP listener socket at a fixed address (trap receiver).
pub(crate) async fn bind_listener_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}
