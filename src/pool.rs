//! Connection pool.
//!
//! A [`Pool`] owns N independent clients for one agent, hands them out
//! round-robin, and runs a background health checker that revives dead
//! slots and closes idle ones. There is no waiter queue: when every slot
//! is unhealthy, [`acquire`](Pool::acquire) fails fast and the caller
//! decides whether to retry.

use std::ops::Deref;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{Client, ClientBuilder};
use crate::error::{Error, Result};
use crate::metrics::PoolMetrics;
use crate::oid::Oid;
use crate::varbind::VarBind;

/// Builder for [`Pool`].
pub struct PoolBuilder {
    client: ClientBuilder,
    size: usize,
    max_idle_time: Duration,
    health_check_interval: Duration,
}

impl PoolBuilder {
    /// Create a pool builder around a client configuration.
    pub fn new(client: ClientBuilder) -> Self {
        Self {
            client,
            size: 3,
            max_idle_time: Duration::from_secs(300),
            health_check_interval: Duration::from_secs(30),
        }
    }

    /// Number of clients in the pool (default: 3).
    pub fn size(mut self, size: usize) -> Self {
        self.size = size.max(1);
        self
    }

    /// Idle time after which a healthy, unused slot is closed
    /// (default: 5 min). Closed slots stay in the pool and are revived
    /// by the health checker when needed.
    pub fn max_idle_time(mut self, d: Duration) -> Self {
        self.max_idle_time = d;
        self
    }

    /// Health checker period (default: 30 s).
    pub fn health_check_interval(mut self, d: Duration) -> Self {
        self.health_check_interval = d;
        self
    }

    /// Build the pool and connect its clients.
    ///
    /// At least one client must connect; otherwise the first connect
    /// error is returned.
    pub async fn connect(self, cancel: &CancellationToken) -> Result<Pool> {
        let mut slots = Vec::with_capacity(self.size);
        let mut first_err = None;
        let mut connected = 0i64;

        for _ in 0..self.size {
            let client = self.client.clone().build()?;
            match client.connect(cancel).await {
                Ok(()) => connected += 1,
                Err(e) if first_err.is_none() => first_err = Some(e),
                Err(_) => {}
            }
            slots.push(PoolSlot {
                client,
                last_used: Mutex::new(Instant::now()),
                in_flight: AtomicI64::new(0),
            });
        }

        if connected == 0 {
            return Err(first_err.unwrap_or(Error::NoHealthyConnections));
        }

        let metrics = PoolMetrics::default();
        metrics.total_clients.set(slots.len() as i64);
        metrics.healthy_clients.set(connected);

        let inner = Arc::new(PoolInner {
            slots,
            robin: AtomicUsize::new(0),
            metrics,
            max_idle_time: self.max_idle_time,
            shutdown: CancellationToken::new(),
        });

        let checker = spawn_health_checker(Arc::clone(&inner), self.health_check_interval);

        Ok(Pool {
            inner,
            checker: Mutex::new(Some(checker)),
        })
    }
}

struct PoolSlot {
    client: Client,
    last_used: Mutex<Instant>,
    in_flight: AtomicI64,
}

struct PoolInner {
    slots: Vec<PoolSlot>,
    robin: AtomicUsize,
    metrics: PoolMetrics,
    max_idle_time: Duration,
    shutdown: CancellationToken,
}

/// Pool of SNMP clients targeting one agent.
pub struct Pool {
    inner: Arc<PoolInner>,
    checker: Mutex<Option<JoinHandle<()>>>,
}

impl Pool {
    /// Create a builder around a client configuration.
    pub fn builder(client: ClientBuilder) -> PoolBuilder {
        PoolBuilder::new(client)
    }

    /// Acquire a healthy client round-robin.
    ///
    /// The returned guard dereferences to the client and releases the
    /// slot (decrements its in-flight count) on drop. Fails fast with
    /// [`Error::NoHealthyConnections`] when no slot is connected.
    pub fn acquire(&self) -> Result<PooledClient> {
        self.inner.metrics.total_requests.incr();

        let n = self.inner.slots.len();
        let start = self.inner.robin.fetch_add(1, Ordering::Relaxed) % n;

        for i in 0..n {
            let idx = (start + i) % n;
            let slot = &self.inner.slots[idx];
            if slot.client.is_connected() {
                *slot.last_used.lock().unwrap() = Instant::now();
                slot.in_flight.fetch_add(1, Ordering::AcqRel);
                return Ok(PooledClient {
                    inner: Arc::clone(&self.inner),
                    idx,
                });
            }
        }

        self.inner.metrics.failed_requests.incr();
        Err(Error::NoHealthyConnections)
    }

    /// GET through a pooled client.
    pub async fn get(&self, cancel: &CancellationToken, oids: &[Oid]) -> Result<Vec<VarBind>> {
        self.acquire()?.get(cancel, oids).await
    }

    /// GET-NEXT through a pooled client.
    pub async fn get_next(&self, cancel: &CancellationToken, oids: &[Oid]) -> Result<Vec<VarBind>> {
        self.acquire()?.get_next(cancel, oids).await
    }

    /// GETBULK through a pooled client.
    pub async fn get_bulk(
        &self,
        cancel: &CancellationToken,
        non_repeaters: i32,
        max_repetitions: i32,
        oids: &[Oid],
    ) -> Result<Vec<VarBind>> {
        self.acquire()?
            .get_bulk(cancel, non_repeaters, max_repetitions, oids)
            .await
    }

    /// SET through a pooled client.
    pub async fn set(
        &self,
        cancel: &CancellationToken,
        varbinds: &[VarBind],
    ) -> Result<Vec<VarBind>> {
        self.acquire()?.set(cancel, varbinds).await
    }

    /// Walk through a pooled client.
    pub async fn walk(&self, cancel: &CancellationToken, root: &Oid) -> Result<Vec<VarBind>> {
        self.acquire()?.walk(cancel, root).await
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        self.inner.slots.len()
    }

    /// Number of currently connected slots.
    pub fn healthy_count(&self) -> usize {
        self.inner
            .slots
            .iter()
            .filter(|s| s.client.is_connected())
            .count()
    }

    /// Pool metrics.
    pub fn metrics(&self) -> &PoolMetrics {
        &self.inner.metrics
    }

    /// Stop the health checker and disconnect every slot.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let checker = self.checker.lock().unwrap().take();
        if let Some(checker) = checker {
            let _ = checker.await;
        }

        for slot in &self.inner.slots {
            let _ = slot.client.disconnect().await;
        }

        self.inner.metrics.healthy_clients.set(0);
        tracing::info!(target: "edgesnmp::pool", "pool closed");
    }
}

/// RAII guard for an acquired pool slot.
///
/// Dereferences to the underlying [`Client`]; dropping it releases the
/// slot.
pub struct PooledClient {
    inner: Arc<PoolInner>,
    idx: usize,
}

impl Deref for PooledClient {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.inner.slots[self.idx].client
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        self.inner.slots[self.idx]
            .in_flight
            .fetch_add(-1, Ordering::AcqRel);
    }
}

fn spawn_health_checker(inner: Arc<PoolInner>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick fires immediately; skip it so a freshly built
        // pool is not re-checked at once.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = inner.shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let mut healthy = 0i64;
            for slot in &inner.slots {
                if !slot.client.is_connected() {
                    // Revive dead slots
                    let cancel = CancellationToken::new();
                    match slot.client.connect(&cancel).await {
                        Ok(()) => {
                            *slot.last_used.lock().unwrap() = Instant::now();
                            healthy += 1;
                        }
                        Err(Error::AlreadyConnected) => healthy += 1,
                        Err(e) => {
                            tracing::debug!(
                                target: "edgesnmp::pool",
                                peer = %slot.client.peer_addr(),
                                error = %e,
                                "slot revival failed"
                            );
                        }
                    }
                    continue;
                }

                let idle = slot.last_used.lock().unwrap().elapsed();
                let in_flight = slot.in_flight.load(Ordering::Acquire);

                if idle > inner.max_idle_time && in_flight == 0 {
                    // Close the connection but keep the slot; the next
                    // tick can revive it on demand
                    tracing::debug!(
                        target: "edgesnmp::pool",
                        peer = %slot.client.peer_addr(),
                        ?idle,
                        "closing idle slot"
                    );
                    let _ = slot.client.disconnect().await;
                    continue;
                }

                healthy += 1;
            }

            inner.metrics.healthy_clients.set(healthy);
        }
    })
}
