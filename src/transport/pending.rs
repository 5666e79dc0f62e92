//! Pending-request bookkeeping.
//!
//! The pending table maps request-ids to single-shot response slots. The
//! ordering contract: a slot is inserted before the request datagram is
//! written, so the reader can never observe a response for a request that
//! is not yet registered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::pdu::Pdu;

/// One-shot receiver for a pending request's outcome.
pub(crate) type ResponseSlot = oneshot::Receiver<Result<Pdu>>;

/// Table of outstanding requests, keyed by request-id.
pub(crate) struct PendingTable {
    max_inflight: usize,
    slots: Mutex<HashMap<i32, oneshot::Sender<Result<Pdu>>>>,
}

impl PendingTable {
    pub(crate) fn new(max_inflight: usize) -> Self {
        Self {
            max_inflight,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Register a slot for `request_id`.
    ///
    /// Fails fast with [`Error::TooManyInflight`] when the table is at
    /// capacity. Request-ids come from [`RequestIdGen`], which cannot
    /// repeat an id while its request is outstanding, so an occupied
    /// entry is replaced (the stale sender is dropped and its waiter
    /// observes closure).
    pub(crate) fn register(&self, request_id: i32) -> Result<ResponseSlot> {
        let (tx, rx) = oneshot::channel();
        let mut slots = self.slots.lock().unwrap();

        if slots.len() >= self.max_inflight {
            return Err(Error::TooManyInflight {
                limit: self.max_inflight,
            });
        }

        slots.insert(request_id, tx);
        Ok(rx)
    }

    /// Deliver an outcome to a waiting slot.
    ///
    /// Returns `false` when no slot matches - the late or duplicate
    /// response is the caller's to count and drop.
    pub(crate) fn complete(&self, request_id: i32, outcome: Result<Pdu>) -> bool {
        let sender = self.slots.lock().unwrap().remove(&request_id);
        match sender {
            // A dropped receiver (cancelled caller) is still a match
            Some(tx) => {
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove a slot without delivering (timeout or cancellation).
    pub(crate) fn remove(&self, request_id: i32) {
        self.slots.lock().unwrap().remove(&request_id);
    }

    /// Fail every outstanding slot, draining the table.
    ///
    /// `make_err` is invoked once per slot since errors are not clonable.
    pub(crate) fn fail_all(&self, make_err: impl Fn() -> Error) {
        let drained: Vec<_> = {
            let mut slots = self.slots.lock().unwrap();
            slots.drain().collect()
        };
        for (_, tx) in drained {
            let _ = tx.send(Err(make_err()));
        }
    }

    /// Number of outstanding requests.
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

/// Request-id allocator.
///
/// Seeded to a pseudo-random positive value per client so that restarts
/// do not replay recent ids; increments monotonically, wraps to 1, and
/// never yields zero (zero is reserved on the wire).
pub(crate) struct RequestIdGen {
    counter: AtomicI32,
}

impl RequestIdGen {
    pub(crate) fn new() -> Self {
        Self {
            counter: AtomicI32::new(seed_positive()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_seed(seed: i32) -> Self {
        Self {
            counter: AtomicI32::new(seed),
        }
    }

    /// Allocate the next request-id.
    pub(crate) fn next(&self) -> i32 {
        let prev = self
            .counter
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |prev| {
                Some(next_id(prev))
            })
            .expect("fetch_update closure always returns Some");
        next_id(prev)
    }
}

#[inline]
fn next_id(prev: i32) -> i32 {
    if prev <= 0 || prev == i32::MAX {
        1
    } else {
        prev + 1
    }
}

/// Derive a positive seed from the clock without a RNG dependency.
fn seed_positive() -> i32 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1);
    // Knuth multiplicative hash, masked positive
    let hashed = nanos.wrapping_mul(0x5851_f42d_4c95_7f2d);
    let id = (hashed >> 33) as i32 & i32::MAX;
    if id == 0 {
        1
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn test_register_and_complete() {
        let table = PendingTable::new(16);
        let mut rx = table.register(42).unwrap();
        assert_eq!(table.len(), 1);

        let pdu = Pdu::get_request(42, &[oid!(1, 3, 6)]);
        assert!(table.complete(42, Ok(pdu)));
        assert_eq!(table.len(), 0);

        let outcome = rx.try_recv().unwrap().unwrap();
        assert_eq!(outcome.request_id, 42);
    }

    #[test]
    fn test_complete_unknown_id() {
        let table = PendingTable::new(16);
        let pdu = Pdu::get_request(7, &[oid!(1, 3, 6)]);
        assert!(!table.complete(7, Ok(pdu)));
    }

    #[test]
    fn test_remove_then_complete_is_spurious() {
        let table = PendingTable::new(16);
        let _rx = table.register(5).unwrap();
        table.remove(5);

        let pdu = Pdu::get_request(5, &[oid!(1, 3, 6)]);
        assert!(!table.complete(5, Ok(pdu)));
    }

    #[test]
    fn test_capacity_limit() {
        let table = PendingTable::new(2);
        let _a = table.register(1).unwrap();
        let _b = table.register(2).unwrap();
        assert!(matches!(
            table.register(3),
            Err(Error::TooManyInflight { limit: 2 })
        ));
    }

    #[test]
    fn test_fail_all() {
        let table = PendingTable::new(16);
        let mut rx1 = table.register(1).unwrap();
        let mut rx2 = table.register(2).unwrap();

        table.fail_all(|| Error::ClientClosed);
        assert_eq!(table.len(), 0);

        assert!(matches!(rx1.try_recv().unwrap(), Err(Error::ClientClosed)));
        assert!(matches!(rx2.try_recv().unwrap(), Err(Error::ClientClosed)));
    }

    #[test]
    fn test_request_id_positive_and_monotone() {
        let ids = RequestIdGen::new();
        let mut prev = 0;
        for _ in 0..1000 {
            let id = ids.next();
            assert!(id > 0);
            if prev > 0 && prev < i32::MAX {
                assert!(id > prev || id == 1);
            }
            prev = id;
        }
    }

    #[test]
    fn test_request_id_wraps_to_one_skipping_zero() {
        let ids = RequestIdGen::with_seed(i32::MAX - 2);
        assert_eq!(ids.next(), i32::MAX - 1);
        assert_eq!(ids.next(), i32::MAX);
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);
    }
}
