// Allow large error types - the Error enum carries OIDs inline for
// diagnostics. Boxing would add allocations for a marginal size win.
#![allow(clippy::result_large_err)]

//! # edgesnmp
//!
//! Async SNMP client library and notification receiver for Rust.
//!
//! ## Features
//!
//! - SNMPv1 and v2c, with the v3 security contract for an attachable USM
//!   subsystem
//! - Single-socket async multiplexer: concurrent requests on one client,
//!   correlated by request-id
//! - Timeout/retry supervision and automatic reconnect with jittered
//!   backoff
//! - Version-aware MIB walks (GET-NEXT on v1, GETBULK on v2c/v3)
//! - Trap and inform receiver for both v1 and v2c wire shapes
//! - Connection pool with round-robin selection and health checking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgesnmp::{oid, Client};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> edgesnmp::Result<()> {
//!     let cancel = CancellationToken::new();
//!
//!     let client = Client::builder("192.0.2.1:161")
//!         .community("public")
//!         .connect(&cancel)
//!         .await?;
//!
//!     let result = client.get(&cancel, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]).await?;
//!     println!("sysDescr: {}", result[0].value);
//!
//!     for vb in client.walk(&cancel, &oid!(1, 3, 6, 1, 2, 1, 2, 2)).await? {
//!         println!("{}", vb);
//!     }
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Receiving Traps
//!
//! ```rust,no_run
//! use edgesnmp::trap::TrapReceiver;
//!
//! # async fn example() -> edgesnmp::Result<()> {
//! let receiver = TrapReceiver::builder()
//!     .bind("0.0.0.0:1162")
//!     .community("public")
//!     .start(|trap| {
//!         println!("trap from {}: {} varbinds", trap.source, trap.varbinds.len());
//!     })
//!     .await?;
//! # receiver.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod ber;
pub mod client;
pub mod error;
pub mod message;
pub mod metrics;
pub mod oid;
pub mod pdu;
pub mod pool;
pub mod trap;
pub mod v3;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod transport;

// Re-exports for convenience
pub use client::{Client, ClientBuilder, ClientConfig, ConnectionState};
pub use error::{DecodeErrorKind, Error, ErrorStatus, Result};
pub use message::Message;
pub use metrics::{Metrics, MetricsSnapshot, PoolMetrics};
pub use oid::Oid;
pub use pdu::{GenericTrap, Pdu, PduType, TrapV1Pdu};
pub use pool::{Pool, PoolBuilder, PooledClient};
pub use trap::{Trap, TrapReceiver, TrapReceiverBuilder};
pub use v3::{AuthProtocol, PrivProtocol, SecurityLevel, V3Security};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
