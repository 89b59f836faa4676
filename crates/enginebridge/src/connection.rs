//! # Connection Manager
//!
//! Owns the single connection to the engine and hands out the live `Peer`.
//!
//! ## Discovery
//!
//! The engine listens on one port of a small, fixed range. Discovery tries each
//! port in ascending order, bounded by the connect timeout, and keeps the first
//! that accepts. There is no retry beyond the range.
//!
//! ## Invariants
//! - At most one connection is opened by concurrent first use; discovery runs
//!   under a single async mutex.
//! - A peer whose pump has observed a disconnect is never handed out again.
//!   The next operation reconnects.
//! - `shutdown` is idempotent and safe when never connected.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::error::ConnectionErrorKind;
use crate::error::Result;
use crate::peer::Peer;
use crate::tcp::TcpConnector;
use crate::transport;
use crate::transport::Transport;

/// Opens a transport to a host and port.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, host: &str, port: u16) -> transport::Result<Box<dyn Transport>>;
}

struct Live {
    peer: Arc<Peer>,
    port: u16,
}

pub struct ConnectionManager {
    config: BridgeConfig,
    connector: Arc<dyn Connector>,
    live: Mutex<Option<Live>>,
}

impl ConnectionManager {
    /// A manager that connects over TCP.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let connector = Arc::new(TcpConnector::new(config.max_frame_size));
        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: BridgeConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, connector, live: Mutex::new(None) })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Returns the live peer, connecting first if needed.
    pub async fn ensure_connected(&self) -> Result<Arc<Peer>> {
        let mut live = self.live.lock().await;

        if let Some(current) = live.as_ref() {
            if !current.peer.is_closed() {
                return Ok(current.peer.clone());
            }
            info!(port = current.port, "engine connection lost, reconnecting");
        }
        if let Some(stale) = live.take() {
            stale.peer.close().await;
        }

        let (transport, port) = self.discover().await?;
        let peer = Arc::new(Peer::new(
            format!("{}:{}", self.config.host, port),
            transport,
            self.config.call_timeout,
        ));
        info!(host = %self.config.host, port, "connected to engine");

        *live = Some(Live { peer: peer.clone(), port });
        Ok(peer)
    }

    /// Scans the port range and returns the first transport that connects.
    async fn discover(&self) -> Result<(Box<dyn Transport>, u16)> {
        let mut failures = Vec::new();

        for port in self.config.ports() {
            debug!(host = %self.config.host, port, "trying engine port");
            let attempt = tokio::time::timeout(
                self.config.connect_timeout,
                self.connector.connect(&self.config.host, port),
            )
            .await;

            match attempt {
                Ok(Ok(transport)) => return Ok((transport, port)),
                Ok(Err(e)) => failures.push(format!("{}: {}", port, e)),
                Err(_) => failures.push(format!(
                    "{}: timed out after {:?}",
                    port, self.config.connect_timeout
                )),
            }
        }

        Err(BridgeError::connection(
            ConnectionErrorKind::Unreachable,
            format!(
                "no engine on {} ports {}..={} ({})",
                self.config.host,
                self.config.port_start,
                self.config.port_end,
                failures.join("; ")
            ),
        ))
    }

    /// Drops `peer` if it is still the live one, so the next call reconnects.
    pub async fn discard(&self, peer: &Arc<Peer>) {
        let mut live = self.live.lock().await;
        let is_current = live.as_ref().is_some_and(|l| Arc::ptr_eq(&l.peer, peer));
        if is_current {
            if let Some(stale) = live.take() {
                info!(port = stale.port, "discarding engine connection");
                stale.peer.close().await;
            }
        }
    }

    /// Port of the live connection, if any.
    pub async fn port(&self) -> Option<u16> {
        let live = self.live.lock().await;
        live.as_ref().filter(|l| !l.peer.is_closed()).map(|l| l.port)
    }

    pub async fn is_connected(&self) -> bool {
        self.port().await.is_some()
    }

    /// Closes the connection. A later operation connects again.
    pub async fn shutdown(&self) {
        let mut live = self.live.lock().await;
        if let Some(current) = live.take() {
            current.peer.close().await;
            info!(port = current.port, "engine connection shut down");
        }
    }

    /// Closes the connection without awaiting.
    ///
    /// If another task holds the connection lock the connection is left alone
    /// and `false` is returned.
    pub fn release(&self) -> bool {
        let Ok(mut live) = self.live.try_lock() else {
            return false;
        };
        if let Some(current) = live.take() {
            current.peer.abort();
            info!(port = current.port, "engine connection released");
        }
        true
    }
}
