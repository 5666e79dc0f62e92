//! In-process SNMP agent for integration tests.
//!
//! Binds an ephemeral localhost port and serves GET/GETNEXT/GETBULK/SET
//! from a `BTreeMap` MIB. Fault injection knobs cover the retry and walk
//! misbehavior tests. Stops on drop.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use edgesnmp::{oid, ErrorStatus, Message, Oid, Pdu, PduType, Value, VarBind, Version};

/// Fault-injection and behavior knobs for [`MockAgent`].
#[derive(Clone)]
pub struct AgentBehavior {
    /// Silently drop this many requests before answering.
    pub drop_first: usize,
    /// Sleep before each response.
    pub response_delay: Duration,
    /// Answer GETNEXT/GETBULK with the requested OID itself instead of
    /// its successor (a looping agent).
    pub stuck: bool,
}

impl Default for AgentBehavior {
    fn default() -> Self {
        Self {
            drop_first: 0,
            response_delay: Duration::ZERO,
            stuck: false,
        }
    }
}

/// Scriptable SNMP agent bound to an ephemeral localhost port.
pub struct MockAgent {
    addr: SocketAddr,
    cancel: CancellationToken,
    data: Arc<Mutex<BTreeMap<Oid, Value>>>,
    received: Arc<AtomicUsize>,
    request_ids: Arc<Mutex<Vec<i32>>>,
}

impl MockAgent {
    /// Start an agent serving the default system MIB.
    pub async fn start() -> Self {
        Self::with_data(system_mib()).await
    }

    /// Start an agent serving the given MIB.
    pub async fn with_data(data: BTreeMap<Oid, Value>) -> Self {
        Self::with_behavior(data, AgentBehavior::default()).await
    }

    /// Start an agent with fault injection.
    pub async fn with_behavior(data: BTreeMap<Oid, Value>, behavior: AgentBehavior) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let data = Arc::new(Mutex::new(data));
        let received = Arc::new(AtomicUsize::new(0));
        let request_ids = Arc::new(Mutex::new(Vec::new()));

        let loop_cancel = cancel.clone();
        let loop_data = Arc::clone(&data);
        let loop_received = Arc::clone(&received);
        let loop_ids = Arc::clone(&request_ids);

        tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            loop {
                let (len, source) = tokio::select! {
                    _ = loop_cancel.cancelled() => return,
                    result = socket.recv_from(&mut buf) => match result {
                        Ok(pair) => pair,
                        Err(_) => return,
                    },
                };

                let request = match Message::decode(Bytes::copy_from_slice(&buf[..len])) {
                    Ok(msg) => msg,
                    Err(_) => continue,
                };

                loop_ids.lock().unwrap().push(request.pdu.request_id);

                let seen = loop_received.fetch_add(1, Ordering::SeqCst);
                if seen < behavior.drop_first {
                    continue;
                }

                let response_pdu = {
                    let mut mib = loop_data.lock().unwrap();
                    answer(&request.pdu, request.version, &behavior, &mut mib)
                };

                let response = Message::new(request.version, request.community, response_pdu);
                if !behavior.response_delay.is_zero() {
                    tokio::time::sleep(behavior.response_delay).await;
                }
                let _ = socket.send_to(&response.encode(), source).await;
            }
        });

        Self {
            addr,
            cancel,
            data,
            received,
            request_ids,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Total datagrams received, including dropped ones.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    /// Request-ids of every received datagram, in arrival order.
    pub fn request_ids(&self) -> Vec<i32> {
        self.request_ids.lock().unwrap().clone()
    }

    /// Read back a MIB entry.
    pub fn get(&self, oid: &Oid) -> Option<Value> {
        self.data.lock().unwrap().get(oid).cloned()
    }

    /// Insert a MIB entry.
    pub fn set(&self, oid: Oid, value: Value) {
        self.data.lock().unwrap().insert(oid, value);
    }
}

impl Drop for MockAgent {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Compute the response PDU for one request.
fn answer(
    request: &Pdu,
    version: Version,
    behavior: &AgentBehavior,
    mib: &mut BTreeMap<Oid, Value>,
) -> Pdu {
    let mut response = Pdu {
        pdu_type: PduType::Response,
        request_id: request.request_id,
        error_status: 0,
        error_index: 0,
        varbinds: Vec::new(),
    };

    match request.pdu_type {
        PduType::GetRequest => {
            for (i, vb) in request.varbinds.iter().enumerate() {
                match mib.get(&vb.oid) {
                    Some(value) => response
                        .varbinds
                        .push(VarBind::new(vb.oid.clone(), value.clone())),
                    None if version == Version::V1 => {
                        response.error_status = ErrorStatus::NoSuchName.as_i32();
                        response.error_index = (i + 1) as i32;
                        response.varbinds = request.varbinds.clone();
                        return response;
                    }
                    None => response
                        .varbinds
                        .push(VarBind::new(vb.oid.clone(), Value::NoSuchObject)),
                }
            }
        }

        PduType::GetNextRequest => {
            for (i, vb) in request.varbinds.iter().enumerate() {
                if behavior.stuck {
                    response
                        .varbinds
                        .push(VarBind::new(vb.oid.clone(), Value::Integer(0)));
                    continue;
                }
                match next_entry(mib, &vb.oid) {
                    Some((oid, value)) => response.varbinds.push(VarBind::new(oid, value)),
                    None if version == Version::V1 => {
                        response.error_status = ErrorStatus::NoSuchName.as_i32();
                        response.error_index = (i + 1) as i32;
                        response.varbinds = request.varbinds.clone();
                        return response;
                    }
                    None => response
                        .varbinds
                        .push(VarBind::new(vb.oid.clone(), Value::EndOfMibView)),
                }
            }
        }

        PduType::GetBulkRequest => {
            let max_repetitions = request.max_repetitions().max(0) as usize;
            for vb in &request.varbinds {
                if behavior.stuck {
                    response
                        .varbinds
                        .push(VarBind::new(vb.oid.clone(), Value::Integer(0)));
                    continue;
                }
                let mut cursor = vb.oid.clone();
                for _ in 0..max_repetitions {
                    match next_entry(mib, &cursor) {
                        Some((oid, value)) => {
                            cursor = oid.clone();
                            response.varbinds.push(VarBind::new(oid, value));
                        }
                        None => {
                            response
                                .varbinds
                                .push(VarBind::new(cursor.clone(), Value::EndOfMibView));
                            break;
                        }
                    }
                }
            }
        }

        PduType::SetRequest => {
            for vb in &request.varbinds {
                mib.insert(vb.oid.clone(), vb.value.clone());
            }
            response.varbinds = request.varbinds.clone();
        }

        _ => {
            response.error_status = ErrorStatus::GenErr.as_i32();
            response.varbinds = request.varbinds.clone();
        }
    }

    response
}

fn next_entry(mib: &BTreeMap<Oid, Value>, after: &Oid) -> Option<(Oid, Value)> {
    mib.range::<Oid, _>((Bound::Excluded(after), Bound::Unbounded))
        .next()
        .map(|(oid, value)| (oid.clone(), value.clone()))
}

/// A small system-group MIB.
pub fn system_mib() -> BTreeMap<Oid, Value> {
    let mut mib = BTreeMap::new();
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("Router"));
    mib.insert(
        oid!(1, 3, 6, 1, 2, 1, 1, 2, 0),
        Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 8072)),
    );
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(123456));
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("router1"));
    mib
}

/// The interfaces-table fixture from the walk scenarios: three ifIndex
/// rows, one ifDescr row, and one entry outside the table.
pub fn if_table_mib() -> BTreeMap<Oid, Value> {
    let mut mib = BTreeMap::new();
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 1), Value::Integer(1));
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 2), Value::Integer(2));
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 3), Value::Integer(3));
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 1), Value::from("eth0"));
    mib.insert(oid!(1, 3, 6, 1, 2, 1, 4, 1, 0), Value::Integer(1));
    mib
}
