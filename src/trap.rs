//! SNMP notification receiver.
//!
//! A [`TrapReceiver`] binds a UDP listener and decodes incoming
//! notifications: SNMPv2c traps and informs (ordinary message envelope,
//! PDU tags 0xA7/0xA6) and SNMPv1 traps (the distinct Trap-PDU shape,
//! tried second). Each accepted notification becomes a version-neutral
//! [`Trap`] record handed to the user's handler on a detached task, so a
//! slow handler never stalls the reader.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::Mutex;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ber::{Decoder, MAX_MESSAGE_LEN};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::message::Message;
use crate::metrics::Metrics;
use crate::oid::Oid;
use crate::pdu::{PduType, TrapV1Pdu};
use crate::transport::bind_listener_socket;
use crate::varbind::VarBind;
use crate::version::Version;

/// Well-known notification OIDs.
pub mod oids {
    use crate::oid::Oid;

    /// sysUpTime.0 - first varbind in v2c/v3 notifications.
    pub fn sys_uptime() -> Oid {
        crate::oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
    }

    /// snmpTrapOID.0 - second varbind in v2c/v3 notifications.
    pub fn snmp_trap_oid() -> Oid {
        crate::oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0)
    }
}

/// Version-neutral notification record.
///
/// The v1-specific header fields are `None` for v2c notifications; for
/// v1 traps, `timestamp` is the Trap-PDU TimeTicks and for v2c it is the
/// sysUpTime.0 varbind value.
#[derive(Debug, Clone)]
pub struct Trap {
    /// SNMP version of the received message.
    pub version: Version,
    /// Community string from the envelope.
    pub community: Bytes,
    /// Datagram source address.
    pub source: SocketAddr,
    /// Agent uptime in hundredths of a second.
    pub timestamp: u32,
    /// Enterprise OID (v1 only).
    pub enterprise: Option<Oid>,
    /// Agent address from the Trap-PDU header (v1 only).
    pub agent_addr: Option<Ipv4Addr>,
    /// Generic trap code 0..=6 (v1 only).
    pub generic_trap: Option<i32>,
    /// Specific trap code (v1 only).
    pub specific_trap: Option<i32>,
    /// Variable bindings in wire order.
    pub varbinds: Vec<VarBind>,
}

/// Handler invoked per received notification.
pub type TrapHandler = Arc<dyn Fn(Trap) + Send + Sync>;

/// Builder for [`TrapReceiver`].
pub struct TrapReceiverBuilder {
    bind_addr: String,
    community: Option<Bytes>,
}

impl TrapReceiverBuilder {
    /// Create a builder listening on `0.0.0.0:162`.
    ///
    /// Port 162 needs privileges on most systems; tests and unprivileged
    /// deployments can bind any high port instead.
    pub fn new() -> Self {
        Self {
            bind_addr: "0.0.0.0:162".to_string(),
            community: None,
        }
    }

    /// Set the listen address.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Only accept notifications carrying this community; others are
    /// dropped and counted.
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = Some(community.into());
        self
    }

    /// Bind the socket and start the read loop.
    pub async fn start(self, handler: impl Fn(Trap) + Send + Sync + 'static) -> Result<TrapReceiver> {
        let bind_addr: SocketAddr = self.bind_addr.parse().map_err(|_| {
            Error::Config(format!("invalid bind address: {}", self.bind_addr).into())
        })?;

        let socket = bind_listener_socket(bind_addr)
            .await
            .map_err(|e| Error::io(bind_addr, e))?;
        let local_addr = socket.local_addr().map_err(|e| Error::io(bind_addr, e))?;

        let metrics = Arc::new(Metrics::new());
        let shutdown = CancellationToken::new();
        let handler: TrapHandler = Arc::new(handler);

        let reader = spawn_read_loop(
            socket,
            Arc::clone(&metrics),
            shutdown.clone(),
            self.community,
            handler,
        );

        tracing::info!(
            target: "edgesnmp::trap",
            local_addr = %local_addr,
            "trap receiver started"
        );

        Ok(TrapReceiver {
            local_addr,
            metrics,
            shutdown,
            reader: Mutex::new(Some(reader)),
        })
    }
}

impl Default for TrapReceiverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Bound UDP listener for traps and informs.
pub struct TrapReceiver {
    local_addr: SocketAddr,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl TrapReceiver {
    /// Create a builder.
    pub fn builder() -> TrapReceiverBuilder {
        TrapReceiverBuilder::new()
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The receiver's metrics (`traps_received`, `community_mismatches`,
    /// `errors`).
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Stop the receiver: close the socket and join the reader.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let reader = self.reader.lock().unwrap().take();
        if let Some(reader) = reader {
            let _ = reader.await;
        }
        tracing::info!(
            target: "edgesnmp::trap",
            local_addr = %self.local_addr,
            "trap receiver stopped"
        );
    }
}

impl Drop for TrapReceiver {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn spawn_read_loop(
    socket: UdpSocket,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
    expected_community: Option<Bytes>,
    handler: TrapHandler,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_MESSAGE_LEN];

        loop {
            let (len, source) = tokio::select! {
                biased;

                _ = shutdown.cancelled() => return,

                result = socket.recv_from(&mut buf) => match result {
                    Ok(pair) => pair,
                    Err(_) if shutdown.is_cancelled() => return,
                    Err(e) => {
                        tracing::warn!(target: "edgesnmp::trap", error = %e, "recv error");
                        continue;
                    }
                },
            };

            metrics.traps_received.incr();

            let trap = match decode_trap(&buf[..len], source) {
                Ok(Some(trap)) => trap,
                Ok(None) => {
                    // Well-formed message, but not a notification PDU
                    tracing::debug!(
                        target: "edgesnmp::trap",
                        source = %source,
                        "ignoring non-notification message"
                    );
                    continue;
                }
                Err(e) => {
                    metrics.errors.incr();
                    tracing::warn!(
                        target: "edgesnmp::trap",
                        source = %source,
                        error = %e,
                        "failed to decode trap"
                    );
                    continue;
                }
            };

            if let Some(expected) = &expected_community {
                if &trap.community != expected {
                    metrics.community_mismatches.incr();
                    tracing::warn!(
                        target: "edgesnmp::trap",
                        source = %source,
                        "trap community mismatch, dropping"
                    );
                    continue;
                }
            }

            // Detached task: a slow handler cannot stall this loop
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler(trap) });
        }
    })
}

/// Decode a datagram as a notification.
///
/// v2c first (ordinary envelope); if that fails to parse, the v1 trap
/// shape. `Ok(None)` means a well-formed message that is not a
/// notification.
fn decode_trap(data: &[u8], source: SocketAddr) -> Result<Option<Trap>> {
    match Message::decode(Bytes::copy_from_slice(data)) {
        Ok(message) => match message.pdu.pdu_type {
            PduType::TrapV2 | PduType::InformRequest => {
                // sysUpTime.0 rides in the varbind list for v2c
                let timestamp = message
                    .pdu
                    .varbinds
                    .iter()
                    .find(|vb| vb.oid == oids::sys_uptime())
                    .and_then(|vb| vb.value.as_u32())
                    .unwrap_or(0);

                Ok(Some(Trap {
                    version: message.version,
                    community: message.community,
                    source,
                    timestamp,
                    enterprise: None,
                    agent_addr: None,
                    generic_trap: None,
                    specific_trap: None,
                    varbinds: message.pdu.varbinds,
                }))
            }
            _ => Ok(None),
        },
        // The v1 Trap-PDU has a different body shape, so the ordinary
        // decode fails on it; retry with the v1 structure.
        Err(_) => decode_v1_trap(data, source).map(Some),
    }
}

fn decode_v1_trap(data: &[u8], source: SocketAddr) -> Result<Trap> {
    let mut decoder = Decoder::from_slice(data);
    let mut seq = decoder.read_sequence()?;

    let version_num = seq.read_integer()?;
    let version = Version::from_i32(version_num)
        .ok_or_else(|| Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(version_num)))?;

    let community = seq.read_octet_string()?;
    let pdu = TrapV1Pdu::decode(&mut seq)?;

    Ok(Trap {
        version,
        community,
        source,
        timestamp: pdu.time_stamp,
        enterprise: Some(pdu.enterprise),
        agent_addr: Some(Ipv4Addr::from(pdu.agent_addr)),
        generic_trap: Some(pdu.generic_trap),
        specific_trap: Some(pdu.specific_trap),
        varbinds: pdu.varbinds,
    })
}
