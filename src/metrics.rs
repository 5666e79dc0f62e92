//! Client and pool metrics.
//!
//! Counters and gauges are lock-free atomics safe to bump from any task;
//! the latency histogram takes a short mutex per observation. Metrics are
//! shared as `Arc<Metrics>` between a client, its reader task, and callers
//! that want to inspect them.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Monotonically increasing atomic counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Increment by one.
    pub fn incr(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a delta.
    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Current value.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Atomic gauge that can move in both directions.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    /// Set the gauge.
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Add a (possibly negative) delta.
    pub fn add(&self, delta: i64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Current value.
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Millisecond bucket bounds for [`LatencyHistogram`].
const LATENCY_BOUNDS_MS: [u64; 12] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000, 10000];

/// Request latency distribution over fixed millisecond buckets.
#[derive(Debug)]
pub struct LatencyHistogram {
    inner: Mutex<HistogramInner>,
}

#[derive(Debug)]
struct HistogramInner {
    count: u64,
    sum_ms: u64,
    min_ms: Option<u64>,
    max_ms: u64,
    // One bucket per bound plus overflow
    buckets: [u64; LATENCY_BOUNDS_MS.len() + 1],
}

impl LatencyHistogram {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HistogramInner {
                count: 0,
                sum_ms: 0,
                min_ms: None,
                max_ms: 0,
                buckets: [0; LATENCY_BOUNDS_MS.len() + 1],
            }),
        }
    }

    /// Record a latency in milliseconds.
    pub fn observe_ms(&self, latency_ms: u64) {
        let mut inner = self.inner.lock().unwrap();

        inner.count += 1;
        inner.sum_ms += latency_ms;
        inner.min_ms = Some(inner.min_ms.map_or(latency_ms, |m| m.min(latency_ms)));
        inner.max_ms = inner.max_ms.max(latency_ms);

        let idx = LATENCY_BOUNDS_MS
            .iter()
            .position(|&bound| latency_ms <= bound)
            .unwrap_or(LATENCY_BOUNDS_MS.len());
        inner.buckets[idx] += 1;
    }

    /// Record a duration.
    pub fn observe(&self, d: Duration) {
        self.observe_ms(d.as_millis() as u64);
    }

    /// Snapshot the current statistics.
    pub fn stats(&self) -> LatencyStats {
        let inner = self.inner.lock().unwrap();
        LatencyStats {
            count: inner.count,
            sum_ms: inner.sum_ms,
            min_ms: inner.min_ms,
            max_ms: inner.max_ms,
            avg_ms: if inner.count > 0 {
                inner.sum_ms as f64 / inner.count as f64
            } else {
                0.0
            },
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time latency statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub sum_ms: u64,
    pub min_ms: Option<u64>,
    pub max_ms: u64,
    pub avg_ms: f64,
}

/// All metrics for one client (or one trap receiver).
#[derive(Debug)]
pub struct Metrics {
    // Request flow
    pub requests_sent: Counter,
    pub responses_received: Counter,
    pub timeouts: Counter,
    pub retries: Counter,
    pub errors: Counter,
    /// Responses whose pending slot was already gone (late or duplicate).
    pub spurious_responses: Counter,
    /// Submissions currently awaiting a response.
    pub inflight_requests: Gauge,

    // Per-operation counts
    pub get_requests: Counter,
    pub get_next_requests: Counter,
    pub get_bulk_requests: Counter,
    pub set_requests: Counter,
    pub walk_requests: Counter,

    // Notifications
    pub traps_received: Counter,
    pub community_mismatches: Counter,

    // Varbind volume
    pub varbinds_sent: Counter,
    pub varbinds_received: Counter,

    // Latency
    pub request_latency: LatencyHistogram,

    // Connection lifecycle
    pub connection_attempts: Counter,
    pub active_connections: Gauge,
    pub reconnect_attempts: Counter,

    start_time: Instant,
}

impl Metrics {
    /// Create a fresh metrics set.
    pub fn new() -> Self {
        Self {
            requests_sent: Counter::default(),
            responses_received: Counter::default(),
            timeouts: Counter::default(),
            retries: Counter::default(),
            errors: Counter::default(),
            spurious_responses: Counter::default(),
            inflight_requests: Gauge::default(),
            get_requests: Counter::default(),
            get_next_requests: Counter::default(),
            get_bulk_requests: Counter::default(),
            set_requests: Counter::default(),
            walk_requests: Counter::default(),
            traps_received: Counter::default(),
            community_mismatches: Counter::default(),
            varbinds_sent: Counter::default(),
            varbinds_received: Counter::default(),
            request_latency: LatencyHistogram::new(),
            connection_attempts: Counter::default(),
            active_connections: Gauge::default(),
            reconnect_attempts: Counter::default(),
            start_time: Instant::now(),
        }
    }

    /// Snapshot every metric at once.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_sent: self.requests_sent.value(),
            responses_received: self.responses_received.value(),
            timeouts: self.timeouts.value(),
            retries: self.retries.value(),
            errors: self.errors.value(),
            spurious_responses: self.spurious_responses.value(),
            inflight_requests: self.inflight_requests.value(),
            get_requests: self.get_requests.value(),
            get_next_requests: self.get_next_requests.value(),
            get_bulk_requests: self.get_bulk_requests.value(),
            set_requests: self.set_requests.value(),
            walk_requests: self.walk_requests.value(),
            traps_received: self.traps_received.value(),
            community_mismatches: self.community_mismatches.value(),
            varbinds_sent: self.varbinds_sent.value(),
            varbinds_received: self.varbinds_received.value(),
            request_latency: self.request_latency.stats(),
            connection_attempts: self.connection_attempts.value(),
            active_connections: self.active_connections.value(),
            reconnect_attempts: self.reconnect_attempts.value(),
            uptime: self.start_time.elapsed(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub timeouts: u64,
    pub retries: u64,
    pub errors: u64,
    pub spurious_responses: u64,
    pub inflight_requests: i64,
    pub get_requests: u64,
    pub get_next_requests: u64,
    pub get_bulk_requests: u64,
    pub set_requests: u64,
    pub walk_requests: u64,
    pub traps_received: u64,
    pub community_mismatches: u64,
    pub varbinds_sent: u64,
    pub varbinds_received: u64,
    pub request_latency: LatencyStats,
    pub connection_attempts: u64,
    pub active_connections: i64,
    pub reconnect_attempts: u64,
    pub uptime: Duration,
}

/// Pool-level metrics.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    pub total_clients: Gauge,
    pub healthy_clients: Gauge,
    pub total_requests: Counter,
    pub failed_requests: Counter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let c = Counter::default();
        assert_eq!(c.value(), 0);
        c.incr();
        c.add(4);
        assert_eq!(c.value(), 5);
    }

    #[test]
    fn test_gauge() {
        let g = Gauge::default();
        g.set(10);
        g.add(-3);
        assert_eq!(g.value(), 7);
    }

    #[test]
    fn test_histogram_buckets() {
        let h = LatencyHistogram::new();
        h.observe_ms(1);
        h.observe_ms(30);
        h.observe_ms(20000); // overflow bucket

        let stats = h.stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.sum_ms, 20031);
        assert_eq!(stats.min_ms, Some(1));
        assert_eq!(stats.max_ms, 20000);
        assert!((stats.avg_ms - 20031.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_empty_stats() {
        let h = LatencyHistogram::new();
        let stats = h.stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.min_ms, None);
        assert_eq!(stats.avg_ms, 0.0);
    }

    #[test]
    fn test_snapshot() {
        let m = Metrics::new();
        m.requests_sent.incr();
        m.retries.add(2);
        m.active_connections.set(1);

        let snap = m.snapshot();
        assert_eq!(snap.requests_sent, 1);
        assert_eq!(snap.retries, 2);
        assert_eq!(snap.active_connections, 1);
    }
}
