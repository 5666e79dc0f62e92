//! Client construction.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use super::{Client, ClientConfig, OnConnect, OnConnectionLost, OnReconnecting};
use crate::error::{Error, Result};
use crate::v3::V3Security;
use crate::version::Version;

/// Builder for [`Client`].
///
/// ```rust,no_run
/// use edgesnmp::{Client, Version};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> edgesnmp::Result<()> {
/// let cancel = CancellationToken::new();
/// let client = Client::builder("192.0.2.1:161")
///     .version(Version::V2c)
///     .community("public")
///     .timeout(Duration::from_secs(2))
///     .retries(2)
///     .connect(&cancel)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ClientBuilder {
    target: String,
    version: Version,
    community: Bytes,
    timeout: Duration,
    retries: u32,
    max_oids: usize,
    max_repetitions: i32,
    non_repeaters: i32,
    max_inflight: usize,
    auto_reconnect: bool,
    reconnect_initial: Duration,
    reconnect_max: Duration,
    max_reconnect_attempts: u32,
    v3_security: Option<V3Security>,
    on_connect: Option<OnConnect>,
    on_connection_lost: Option<OnConnectionLost>,
    on_reconnecting: Option<OnReconnecting>,
}

impl ClientBuilder {
    /// Create a builder for the given target (`"host:port"`).
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            version: Version::V2c,
            community: Bytes::from_static(b"public"),
            timeout: Duration::from_secs(5),
            retries: 3,
            max_oids: 60,
            max_repetitions: 10,
            non_repeaters: 0,
            max_inflight: 256,
            auto_reconnect: true,
            reconnect_initial: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(120),
            max_reconnect_attempts: 0,
            v3_security: None,
            on_connect: None,
            on_connection_lost: None,
            on_reconnecting: None,
        }
    }

    /// SNMP version (default: v2c).
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Community string (default: "public").
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// Per-attempt response timeout (default: 5 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retries after the first timeout (default: 3).
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Maximum OIDs per request before batching (default: 60).
    pub fn max_oids(mut self, max_oids: usize) -> Self {
        self.max_oids = max_oids.max(1);
        self
    }

    /// Max-repetitions for GETBULK walks (default: 10).
    pub fn max_repetitions(mut self, max_repetitions: i32) -> Self {
        self.max_repetitions = max_repetitions.max(0);
        self
    }

    /// Non-repeaters for GETBULK walks (default: 0).
    pub fn non_repeaters(mut self, non_repeaters: i32) -> Self {
        self.non_repeaters = non_repeaters.max(0);
        self
    }

    /// Pending-table capacity (default: 256).
    pub fn max_inflight(mut self, max_inflight: usize) -> Self {
        self.max_inflight = max_inflight.max(1);
        self
    }

    /// Enable or disable auto-reconnect (default: enabled).
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Reconnect backoff range (defaults: 1 s initial, 2 min cap).
    pub fn reconnect_interval(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_initial = initial;
        self.reconnect_max = max;
        self
    }

    /// Bound on reconnect attempts; 0 means unlimited (default: 0).
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// SNMPv3 security contract; implies [`Version::V3`].
    pub fn v3_security(mut self, security: V3Security) -> Self {
        self.version = Version::V3;
        self.v3_security = Some(security);
        self
    }

    /// Callback after each successful connect.
    pub fn on_connect(mut self, hook: impl Fn(Client) + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(hook));
        self
    }

    /// Callback after a connection is lost.
    pub fn on_connection_lost(
        mut self,
        hook: impl Fn(Client, Arc<Error>) + Send + Sync + 'static,
    ) -> Self {
        self.on_connection_lost = Some(Arc::new(hook));
        self
    }

    /// Callback before each reconnect attempt.
    pub fn on_reconnecting(mut self, hook: impl Fn(Client) + Send + Sync + 'static) -> Self {
        self.on_reconnecting = Some(Arc::new(hook));
        self
    }

    /// Build a disconnected client.
    ///
    /// The target is resolved here; hostname resolution uses the
    /// platform resolver.
    pub fn build(self) -> Result<Client> {
        let target = self
            .target
            .to_socket_addrs()
            .map_err(|e| Error::Config(format!("cannot resolve '{}': {}", self.target, e).into()))?
            .next()
            .ok_or_else(|| {
                Error::Config(format!("'{}' resolved to no addresses", self.target).into())
            })?;

        Ok(Client::from_config(ClientConfig {
            target,
            version: self.version,
            community: self.community,
            timeout: self.timeout,
            retries: self.retries,
            max_oids: self.max_oids,
            max_repetitions: self.max_repetitions,
            non_repeaters: self.non_repeaters,
            max_inflight: self.max_inflight,
            auto_reconnect: self.auto_reconnect,
            reconnect_initial: self.reconnect_initial,
            reconnect_max: self.reconnect_max,
            max_reconnect_attempts: self.max_reconnect_attempts,
            v3_security: self.v3_security,
            on_connect: self.on_connect,
            on_connection_lost: self.on_connection_lost,
            on_reconnecting: self.on_reconnecting,
        }))
    }

    /// Build and connect in one step.
    pub async fn connect(self, cancel: &CancellationToken) -> Result<Client> {
        let client = self.build()?;
        client.connect(cancel).await?;
        Ok(client)
    }
}
