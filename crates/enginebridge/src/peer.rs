//! # RPC Peer with Async Pump
//!
//! The `Peer` sends requests to the engine over a transport. A background pump
//! task demultiplexes incoming replies and correlates them with pending
//! requests via sequence numbers, so many requests can be in flight at once.
//!
//! ## Invariants
//! - Every pending request is completed exactly once: by its reply, by the
//!   pump shutting down, or by the caller timing out and removing itself.
//! - Once `is_closed()` reports true it never reports false again. A closed
//!   peer is discarded by the connection manager, never revived.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;
use enginepack::Decoder;
use enginerpc::CallEncoder;
use enginerpc::Method;
use enginerpc::RemoteFailure;
use enginerpc::Request;
use enginerpc::Response;
use enginerpc::RpcFrame;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::transport;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Transport(transport::Error),
    /// The request could not be encoded. Nothing was sent.
    Encode(enginerpc::Error),
    /// The reply could not be decoded.
    Decode(enginerpc::Error),
    /// The engine processed the request and reported a failure.
    Remote(RemoteFailure),
    Timeout,
    /// The peer shut down before a reply arrived.
    Closed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Encode(e) => write!(f, "request encoding failed: {}", e),
            Self::Decode(e) => write!(f, "reply decoding failed: {}", e),
            Self::Remote(failure) => write!(f, "remote failure: {}", failure),
            Self::Timeout => write!(f, "request timed out"),
            Self::Closed => write!(f, "peer closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A request waiting for its reply.
struct PendingResponse {
    method: Method,
    tx: oneshot::Sender<Result<Response>>,
}

/// RPC peer with an async message pump.
///
/// Each Peer owns its transport exclusively, so sequence numbers are scoped to
/// a single connection. Peers are shared as `Arc<Peer>`.
pub struct Peer {
    peer_name: String,
    transport: Arc<dyn Transport>,
    pending: Arc<DashMap<u64, PendingResponse>>,
    seq_gen: AtomicU64,
    closed: Arc<AtomicBool>,
    call_timeout: Option<Duration>,
    pump: JoinHandle<()>,
}

impl Peer {
    /// Creates a new peer and spawns the background pump task.
    ///
    /// `call_timeout` of `None` waits for replies indefinitely.
    pub fn new(
        peer_name: impl Into<String>,
        transport: Box<dyn Transport>,
        call_timeout: Option<Duration>,
    ) -> Self {
        let peer_name = peer_name.into();
        let transport: Arc<dyn Transport> = Arc::from(transport);
        let pending = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));

        let pump = tokio::spawn(Self::pump(
            peer_name.clone(),
            transport.clone(),
            pending.clone(),
            closed.clone(),
        ));

        Self {
            peer_name,
            transport,
            pending,
            seq_gen: AtomicU64::new(1),
            closed,
            call_timeout,
            pump,
        }
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    /// True once the connection is known to be unusable.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    async fn pump(
        peer_name: String,
        transport: Arc<dyn Transport>,
        pending: Arc<DashMap<u64, PendingResponse>>,
        closed: Arc<AtomicBool>,
    ) {
        let error = loop {
            match transport.recv().await {
                Ok(Some(msg)) => {
                    if let Err(e) = Self::handle_message(&msg, &pending) {
                        warn!(peer = %peer_name, error = %e, "dropping connection after bad frame");
                        break e;
                    }
                }
                Ok(None) => {
                    info!(peer = %peer_name, "engine closed the connection");
                    break Error::Transport(transport::Error::ConnectionLost("stream closed".into()));
                }
                Err(e) => {
                    warn!(peer = %peer_name, error = %e, "transport error in pump");
                    break Error::Transport(e);
                }
            }
        };

        closed.store(true, Ordering::Release);
        Self::notify_all_pending(&pending, error);
    }

    fn notify_all_pending(pending: &DashMap<u64, PendingResponse>, error: Error) {
        let keys: Vec<u64> = pending.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, pending_resp)) = pending.remove(&key) {
                let _ = pending_resp.tx.send(Err(error.clone()));
            }
        }
    }

    /// Routes one incoming frame.
    ///
    /// A reply whose body cannot be decoded fails only its own request. An
    /// error is returned only when the stream itself can no longer be trusted.
    fn handle_message(msg: &[u8], pending: &DashMap<u64, PendingResponse>) -> Result<()> {
        let mut dec = Decoder::new(msg);
        let frame = match RpcFrame::decode(&mut dec) {
            Ok(frame) => frame,
            Err(e) => {
                let seq = enginerpc::decode_seq(msg).map_err(|_| Error::Decode(e.clone()))?;
                if let Some((_, pending_resp)) = pending.remove(&seq) {
                    let _ = pending_resp.tx.send(Err(Error::Decode(e)));
                }
                return Ok(());
            }
        };

        let RpcFrame::Reply(reply) = frame else {
            return Err(Error::Decode(enginerpc::Error::ProtocolViolation(
                "engine sent a Call frame to the client".into(),
            )));
        };

        let seq = reply.seq;
        let Some((_, pending_resp)) = pending.remove(&seq) else {
            debug!(seq, "reply for unknown or expired request");
            return Ok(());
        };

        let result = match reply.response(pending_resp.method) {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(failure)) => Err(Error::Remote(failure)),
            Err(e) => Err(Error::Decode(e)),
        };

        let _ = pending_resp.tx.send(result);
        Ok(())
    }

    /// Registers a pending response under a fresh sequence number.
    fn prepare_call(&self, method: Method) -> (u64, oneshot::Receiver<Result<Response>>) {
        let seq = self.seq_gen.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(seq, PendingResponse { method, tx });
        (seq, rx)
    }

    /// Sends `request` and awaits its response.
    ///
    /// The request is fully encoded before anything is written to the transport.
    pub async fn call(&self, request: &Request) -> Result<Response> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let method = request.method();
        let (seq, rx) = self.prepare_call(method);

        // The pump may have drained `pending` between the check above and the insert.
        if self.is_closed() {
            self.pending.remove(&seq);
            return Err(Error::Closed);
        }

        let payload = match CallEncoder::new(seq, request).to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                self.pending.remove(&seq);
                return Err(Error::Encode(e));
            }
        };

        debug!(peer = %self.peer_name, seq, %method, bytes = payload.len(), "sending request");
        if let Err(e) = self.transport.send(&payload).await {
            self.pending.remove(&seq);
            self.closed.store(true, Ordering::Release);
            return Err(e.into());
        }

        let outcome = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.pending.remove(&seq);
                    warn!(peer = %self.peer_name, seq, %method, "request timed out");
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_) => {
                self.pending.remove(&seq);
                Err(Error::Closed)
            }
        }
    }

    /// Stops the pump, releases the transport and fails every pending request.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) && self.pump.is_finished() {
            return;
        }
        self.pump.abort();
        if let Err(e) = self.transport.close().await {
            debug!(peer = %self.peer_name, error = %e, "transport close failed");
        }
        Self::notify_all_pending(&self.pending, Error::Closed);
    }

    /// Like `close`, but usable outside async code. The transport is released
    /// once the last reference to it is dropped.
    pub fn abort(&self) {
        self.closed.store(true, Ordering::Release);
        self.pump.abort();
        Self::notify_all_pending(&self.pending, Error::Closed);
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("peer_name", &self.peer_name)
            .field("pending", &self.pending.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
