//! SNMP client.
//!
//! A [`Client`] owns one connected UDP socket (while connected), a pending
//! table shared with the background reader, and the connection state
//! machine:
//!
//! ```text
//! Disconnected --connect()--> Connecting --ok--> Connected
//! Connecting --fail--> Disconnected
//! Connected --disconnect()--> Disconnecting --> Disconnected
//! Connected --I/O error--> Disconnected (auto-reconnect in background)
//! ```

mod builder;
mod walk;

pub use builder::ClientBuilder;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::message::Message;
use crate::metrics::Metrics;
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::transport::pending::{PendingTable, RequestIdGen, ResponseSlot};
use crate::transport::Conn;
use crate::v3::V3Security;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// Callback invoked after a connection is established.
pub type OnConnect = Arc<dyn Fn(Client) + Send + Sync>;
/// Callback invoked when an established connection is lost.
pub type OnConnectionLost = Arc<dyn Fn(Client, Arc<Error>) + Send + Sync>;
/// Callback invoked before each reconnect attempt.
pub type OnReconnecting = Arc<dyn Fn(Client) + Send + Sync>;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Disconnecting,
            _ => Self::Disconnected,
        }
    }
}

/// Client configuration. Construct via [`ClientBuilder`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Agent address.
    pub target: SocketAddr,
    /// SNMP version (default: v2c).
    pub version: Version,
    /// Community string for v1/v2c (default: "public").
    pub community: Bytes,
    /// Per-attempt response timeout (default: 5 s). The overall call
    /// budget is `timeout * (retries + 1)` plus send time.
    pub timeout: Duration,
    /// Retries after the first timeout (default: 3).
    pub retries: u32,
    /// Maximum OIDs per request before batching (default: 60).
    pub max_oids: usize,
    /// Max-repetitions for GETBULK and bulk walks (default: 10).
    pub max_repetitions: i32,
    /// Non-repeaters for GETBULK walks (default: 0).
    pub non_repeaters: i32,
    /// Pending-table capacity; submissions beyond it fail fast
    /// (default: 256).
    pub max_inflight: usize,
    /// Reconnect automatically after connection loss (default: true).
    pub auto_reconnect: bool,
    /// Initial reconnect backoff (default: 1 s).
    pub reconnect_initial: Duration,
    /// Reconnect backoff cap (default: 2 min).
    pub reconnect_max: Duration,
    /// Reconnect attempt bound; 0 means unlimited (default: 0).
    pub max_reconnect_attempts: u32,
    /// SNMPv3 security contract handed to an attached USM subsystem.
    pub v3_security: Option<V3Security>,

    pub(crate) on_connect: Option<OnConnect>,
    pub(crate) on_connection_lost: Option<OnConnectionLost>,
    pub(crate) on_reconnecting: Option<OnReconnecting>,
}

/// An active connection epoch: the socket plus its reader task.
struct Active {
    conn: Arc<Conn>,
    reader: Option<JoinHandle<()>>,
}

struct ClientInner {
    config: ClientConfig,
    state: AtomicU8,
    active: RwLock<Option<Active>>,
    pending: Arc<PendingTable>,
    ids: RequestIdGen,
    metrics: Arc<Metrics>,
    // Serializes reconnect supervisors so loss during a backoff sleep
    // cannot stack a second loop.
    reconnect_running: Mutex<bool>,
}

/// SNMP client. Cheap to clone; clones share one socket and pending table.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Start building a client for the given target (`"host:port"`).
    pub fn builder(target: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(target)
    }

    pub(crate) fn from_config(config: ClientConfig) -> Self {
        let max_inflight = config.max_inflight;
        Self {
            inner: Arc::new(ClientInner {
                config,
                state: AtomicU8::new(ConnectionState::Disconnected as u8),
                active: RwLock::new(None),
                pending: Arc::new(PendingTable::new(max_inflight)),
                ids: RequestIdGen::new(),
                metrics: Arc::new(Metrics::new()),
                reconnect_running: Mutex::new(false),
            }),
        }
    }

    /// The agent address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.config.target
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The client's metrics.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }

    /// The client's configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Number of requests currently awaiting a response.
    pub fn inflight(&self) -> usize {
        self.inner.pending.len()
    }

    fn cas_state(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set_state(&self, to: ConnectionState) {
        self.inner.state.store(to as u8, Ordering::Release);
    }

    /// Establish the connection to the agent.
    ///
    /// Binds an ephemeral local port, connects the socket (so the kernel
    /// rejects datagrams from other sources), and starts the background
    /// reader. Returns [`Error::AlreadyConnected`] unless the client is
    /// disconnected.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<()> {
        if !self.cas_state(ConnectionState::Disconnected, ConnectionState::Connecting) {
            return Err(Error::AlreadyConnected);
        }

        self.inner.metrics.connection_attempts.incr();
        let target = self.inner.config.target;

        let conn = tokio::select! {
            result = Conn::connect(target) => match result {
                Ok(conn) => conn,
                Err(e) => {
                    self.set_state(ConnectionState::Disconnected);
                    return Err(Error::io(target, e));
                }
            },
            _ = cancel.cancelled() => {
                self.set_state(ConnectionState::Disconnected);
                return Err(Error::Cancelled);
            }
        };

        let conn = Arc::new(conn);

        // Weak reference: the reader must not keep a dropped client alive
        let weak: Weak<ClientInner> = Arc::downgrade(&self.inner);
        let reader = conn.spawn_reader(
            Arc::clone(&self.inner.pending),
            Arc::clone(&self.inner.metrics),
            self.inner.config.version,
            move |err| {
                if let Some(inner) = weak.upgrade() {
                    Client { inner }.handle_connection_lost(err);
                }
            },
        );

        *self.inner.active.write().unwrap() = Some(Active {
            conn,
            reader: Some(reader),
        });
        self.set_state(ConnectionState::Connected);
        self.inner.metrics.active_connections.add(1);

        if let Some(hook) = &self.inner.config.on_connect {
            let hook = Arc::clone(hook);
            let client = self.clone();
            tokio::spawn(async move { hook(client) });
        }

        tracing::info!(
            target: "edgesnmp::client",
            peer = %target,
            version = %self.inner.config.version,
            "connected to SNMP agent"
        );

        Ok(())
    }

    /// Close the connection.
    ///
    /// Cancels the reader, joins it, and fails every outstanding request
    /// with [`Error::ClientClosed`].
    pub async fn disconnect(&self) -> Result<()> {
        if !self.cas_state(ConnectionState::Connected, ConnectionState::Disconnecting) {
            return Err(Error::NotConnected);
        }

        let active = self.inner.active.write().unwrap().take();
        if let Some(mut active) = active {
            active.conn.close();
            if let Some(reader) = active.reader.take() {
                let _ = reader.await;
            }
        }

        self.set_state(ConnectionState::Disconnected);
        self.inner.metrics.active_connections.add(-1);
        self.inner.pending.fail_all(|| Error::ClientClosed);

        tracing::info!(
            target: "edgesnmp::client",
            peer = %self.peer_addr(),
            "disconnected from SNMP agent"
        );
        Ok(())
    }

    /// Reader-reported connection loss: tear down, notify, reconnect.
    fn handle_connection_lost(&self, err: Error) {
        if !self.cas_state(ConnectionState::Connected, ConnectionState::Disconnected) {
            return;
        }

        // The reader failed the pending slots before reporting; drop the
        // socket. The reader task is the caller, so it is never awaited
        // here.
        let _ = self.inner.active.write().unwrap().take();
        self.inner.metrics.active_connections.add(-1);

        tracing::warn!(
            target: "edgesnmp::client",
            peer = %self.peer_addr(),
            error = %err,
            "connection lost"
        );

        let err = Arc::new(err);
        if let Some(hook) = &self.inner.config.on_connection_lost {
            let hook = Arc::clone(hook);
            let client = self.clone();
            let err = Arc::clone(&err);
            tokio::spawn(async move { hook(client, err) });
        }

        if self.inner.config.auto_reconnect {
            let client = self.clone();
            tokio::spawn(async move { client.reconnect_loop().await });
        }
    }

    /// Background reconnect supervisor with jittered exponential backoff.
    async fn reconnect_loop(self) {
        {
            let mut running = self.inner.reconnect_running.lock().unwrap();
            if *running {
                return;
            }
            *running = true;
        }

        let mut backoff = self.inner.config.reconnect_initial;
        let mut attempts = 0u32;
        let cancel = CancellationToken::new();

        loop {
            if let Some(hook) = &self.inner.config.on_reconnecting {
                let hook = Arc::clone(hook);
                let client = self.clone();
                tokio::spawn(async move { hook(client) });
            }

            self.inner.metrics.reconnect_attempts.incr();

            match self.connect(&cancel).await {
                Ok(()) | Err(Error::AlreadyConnected) => break,
                Err(e) => {
                    tracing::warn!(
                        target: "edgesnmp::client",
                        peer = %self.peer_addr(),
                        error = %e,
                        retry_in = ?backoff,
                        "reconnect failed"
                    );
                }
            }

            attempts += 1;
            let max = self.inner.config.max_reconnect_attempts;
            if max > 0 && attempts >= max {
                tracing::error!(
                    target: "edgesnmp::client",
                    peer = %self.peer_addr(),
                    attempts,
                    "giving up on reconnect"
                );
                break;
            }

            tokio::time::sleep(backoff).await;

            // Grow by 1.5x-2.0x so colliding clients spread out
            let factor = 1.5 + jitter_unit() * 0.5;
            backoff = Duration::from_secs_f64(backoff.as_secs_f64() * factor)
                .min(self.inner.config.reconnect_max);
        }

        *self.inner.reconnect_running.lock().unwrap() = false;
    }

    fn current_conn(&self) -> Result<Arc<Conn>> {
        if self.state() != ConnectionState::Connected {
            return Err(Error::NotConnected);
        }
        self.inner
            .active
            .read()
            .unwrap()
            .as_ref()
            .map(|a| Arc::clone(&a.conn))
            .ok_or(Error::NotConnected)
    }

    fn next_request_id(&self) -> i32 {
        self.inner.ids.next()
    }

    /// Send one PDU and await its response through the pending table.
    ///
    /// The slot is registered before the datagram is written. On timeout
    /// the identical bytes are re-sent with the same request-id; after
    /// `retries + 1` attempts the call fails with [`Error::Timeout`].
    async fn send_request(&self, cancel: &CancellationToken, pdu: Pdu) -> Result<Pdu> {
        let conn = self.current_conn()?;
        let request_id = pdu.request_id;
        let varbind_count = pdu.varbinds.len() as u64;

        let data = Message::new(
            self.inner.config.version,
            self.inner.config.community.clone(),
            pdu,
        )
        .encode();

        let slot = self.inner.pending.register(request_id)?;
        self.inner.metrics.inflight_requests.add(1);

        let result = self
            .exchange(cancel, &conn, request_id, &data, varbind_count, slot)
            .await;

        self.inner.pending.remove(request_id);
        self.inner.metrics.inflight_requests.add(-1);

        result
    }

    async fn exchange(
        &self,
        cancel: &CancellationToken,
        conn: &Conn,
        request_id: i32,
        data: &[u8],
        varbind_count: u64,
        mut slot: ResponseSlot,
    ) -> Result<Pdu> {
        let metrics = &self.inner.metrics;
        let timeout = self.inner.config.timeout;
        let retries = self.inner.config.retries;
        let start = Instant::now();

        for attempt in 0..=retries {
            if attempt > 0 {
                metrics.retries.incr();
                tracing::debug!(
                    target: "edgesnmp::client",
                    peer = %self.peer_addr(),
                    request_id,
                    attempt,
                    "retrying request"
                );
            }

            // I/O errors fail immediately; only timeouts retry
            conn.send(data).await?;
            metrics.requests_sent.incr();
            metrics.varbinds_sent.add(varbind_count);

            tokio::select! {
                outcome = &mut slot => {
                    return match outcome {
                        Ok(Ok(pdu)) => {
                            metrics.request_latency.observe(start.elapsed());
                            self.check_response(pdu)
                        }
                        Ok(Err(e)) => Err(e),
                        // Sender dropped without a verdict
                        Err(_) => Err(Error::ClientClosed),
                    };
                }
                _ = tokio::time::sleep(timeout) => {
                    metrics.timeouts.incr();
                }
                _ = cancel.cancelled() => {
                    tracing::debug!(
                        target: "edgesnmp::client",
                        peer = %self.peer_addr(),
                        request_id,
                        "request cancelled"
                    );
                    return Err(Error::Cancelled);
                }
            }
        }

        let elapsed = start.elapsed();
        tracing::debug!(
            target: "edgesnmp::client",
            peer = %self.peer_addr(),
            request_id,
            ?elapsed,
            retries,
            "request timed out"
        );
        Err(Error::Timeout {
            target: self.peer_addr(),
            elapsed,
            retries,
        })
    }

    /// Map an error-status response to [`Error::Snmp`].
    fn check_response(&self, pdu: Pdu) -> Result<Pdu> {
        if !pdu.is_error() {
            return Ok(pdu);
        }

        let status = pdu.error_status_enum();
        // error-index is 1-based; 0 means the PDU as a whole
        let oid = (pdu.error_index as usize)
            .checked_sub(1)
            .and_then(|idx| pdu.varbinds.get(idx))
            .map(|vb| vb.oid.clone());

        Err(Error::Snmp {
            target: self.peer_addr(),
            status,
            index: pdu.error_index.max(0) as u32,
            oid,
        })
    }

    fn validate_oids(&self, oids: &[Oid]) -> Result<()> {
        if oids.is_empty() {
            return Err(Error::EmptyRequest);
        }
        for oid in oids {
            oid.validate()?;
        }
        Ok(())
    }

    /// GET one or more OIDs.
    ///
    /// Requests above `max_oids` are split into sequential batches and the
    /// results concatenated in input order.
    pub async fn get(&self, cancel: &CancellationToken, oids: &[Oid]) -> Result<Vec<VarBind>> {
        self.validate_oids(oids)?;
        self.inner.metrics.get_requests.incr();
        self.batched(cancel, oids, Pdu::get_request).await
    }

    /// GET-NEXT one or more OIDs. Batching as in [`get`](Self::get).
    pub async fn get_next(&self, cancel: &CancellationToken, oids: &[Oid]) -> Result<Vec<VarBind>> {
        self.validate_oids(oids)?;
        self.inner.metrics.get_next_requests.incr();
        self.batched(cancel, oids, Pdu::get_next_request).await
    }

    async fn batched(
        &self,
        cancel: &CancellationToken,
        oids: &[Oid],
        make_pdu: fn(i32, &[Oid]) -> Pdu,
    ) -> Result<Vec<VarBind>> {
        let max_oids = self.inner.config.max_oids;

        if oids.len() <= max_oids {
            let pdu = make_pdu(self.next_request_id(), oids);
            let response = self.send_request(cancel, pdu).await?;
            return Ok(response.varbinds);
        }

        tracing::debug!(
            target: "edgesnmp::client",
            peer = %self.peer_addr(),
            oid_count = oids.len(),
            max_oids,
            "splitting request into batches"
        );

        let mut results = Vec::with_capacity(oids.len());
        for chunk in oids.chunks(max_oids) {
            let pdu = make_pdu(self.next_request_id(), chunk);
            let response = self.send_request(cancel, pdu).await?;
            results.extend(response.varbinds);
        }
        Ok(results)
    }

    /// GETBULK (SNMPv2c/v3 only).
    ///
    /// The first `non_repeaters` OIDs yield one successor each; the rest
    /// yield up to `max_repetitions` successors. Rejected synchronously -
    /// no datagram is sent - when the client speaks SNMPv1.
    pub async fn get_bulk(
        &self,
        cancel: &CancellationToken,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Result<Vec<VarBind>> {
        if !self.inner.config.version.supports_bulk() {
            return Err(Error::BulkUnsupported);
        }
        self.validate_oids(oids)?;
        self.inner.metrics.get_bulk_requests.incr();

        let pdu = Pdu::get_bulk_request(
            self.next_request_id(),
            non_repeaters.max(0),
            max_repetitions.max(0),
            oids,
        );
        let response = self.send_request(cancel, pdu).await?;
        Ok(response.varbinds)
    }

    /// SET one or more varbinds.
    ///
    /// Exception markers are response-only and rejected before encoding.
    /// Batching as in [`get`](Self::get).
    pub async fn set(
        &self,
        cancel: &CancellationToken,
        varbinds: &[VarBind],
    ) -> Result<Vec<VarBind>> {
        if varbinds.is_empty() {
            return Err(Error::EmptyRequest);
        }
        for vb in varbinds {
            vb.oid.validate()?;
            if vb.value.is_exception() {
                return Err(Error::InvalidSetValue {
                    oid: vb.oid.clone(),
                });
            }
        }
        self.inner.metrics.set_requests.incr();

        let max_oids = self.inner.config.max_oids;
        if varbinds.len() <= max_oids {
            let pdu = Pdu::set_request(self.next_request_id(), varbinds.to_vec());
            let response = self.send_request(cancel, pdu).await?;
            return Ok(response.varbinds);
        }

        let mut results = Vec::with_capacity(varbinds.len());
        for chunk in varbinds.chunks(max_oids) {
            let pdu = Pdu::set_request(self.next_request_id(), chunk.to_vec());
            let response = self.send_request(cancel, pdu).await?;
            results.extend(response.varbinds);
        }
        Ok(results)
    }

    /// SET a single OID to a value.
    pub async fn set_one(
        &self,
        cancel: &CancellationToken,
        oid: Oid,
        value: impl Into<Value>,
    ) -> Result<VarBind> {
        let mut results = self
            .set(cancel, &[VarBind::new(oid, value.into())])
            .await?;
        results.pop().ok_or(Error::Decode {
            offset: 0,
            kind: crate::error::DecodeErrorKind::EmptyResponse,
        })
    }
}

static JITTER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Pseudo-random value in [0, 1) from a multiplicative hash of an atomic
/// counter. Enough spread to de-synchronize backoff without pulling in a
/// RNG dependency.
fn jitter_unit() -> f64 {
    let counter = JITTER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let hash = counter.wrapping_mul(0x5851_f42d_4c95_7f2d);
    (hash >> 11) as f64 / ((1u64 << 53) as f64)
}
