//! In-process stand-ins for the engine, used by the test suites.
//!
//! `FakeEngine` answers Call frames with a scripted handler and records every
//! request it saw. It can be reached three ways: directly as a `Transport`,
//! through `FakeConnector` (which also records port attempts), or over real
//! TCP via `FakeEngine::serve`.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use enginepack::Decoder;
use enginerpc::Method;
use enginerpc::RemoteFailure;
use enginerpc::ReplyEncoder;
use enginerpc::Request;
use enginerpc::Response;
use enginerpc::RpcFrame;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connection::Connector;
use crate::tcp;
use crate::transport;
use crate::transport::Transport;

pub type Reply = std::result::Result<Response, RemoteFailure>;

type Handler = dyn Fn(&Request) -> Reply + Send + Sync;

struct Inner {
    handler: Box<Handler>,
    requests: Mutex<Vec<Request>>,
    writes: AtomicUsize,
    muted: AtomicBool,
    links: DashMap<usize, mpsc::UnboundedSender<Vec<u8>>>,
    next_link: AtomicUsize,
}

/// A scripted engine.
#[derive(Clone)]
pub struct FakeEngine {
    inner: Arc<Inner>,
}

impl FakeEngine {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Reply + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                handler: Box::new(handler),
                requests: Mutex::new(Vec::new()),
                writes: AtomicUsize::new(0),
                muted: AtomicBool::new(false),
                links: DashMap::new(),
                next_link: AtomicUsize::new(0),
            }),
        }
    }

    /// An engine that accepts everything with neutral answers.
    pub fn permissive() -> Self {
        Self::new(|request| Ok(default_response(request)))
    }

    /// Opens a new in-memory connection to this engine.
    pub fn transport(&self) -> FakeTransport {
        let id = self.inner.next_link.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.links.insert(id, tx);
        FakeTransport { engine: self.clone(), id, rx: Mutex::new(rx) }
    }

    /// Every request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<Request> {
        self.inner.requests.lock().await.clone()
    }

    pub async fn count(&self, method: Method) -> usize {
        self.inner.requests.lock().await.iter().filter(|r| r.method() == method).count()
    }

    /// Number of frames written to this engine by clients.
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Stop replying. Requests are still recorded.
    pub fn mute(&self, muted: bool) {
        self.inner.muted.store(muted, Ordering::Relaxed);
    }

    /// Drops every open connection, as if the engine exited.
    pub fn disconnect_all(&self) {
        self.inner.links.clear();
    }

    pub fn connections(&self) -> usize {
        self.inner.links.len()
    }

    /// Handles one frame. Returns the reply frame, if any.
    pub async fn respond(&self, frame: &[u8]) -> transport::Result<Option<Vec<u8>>> {
        self.inner.writes.fetch_add(1, Ordering::Relaxed);

        let mut dec = Decoder::new(frame);
        let RpcFrame::Call(call) = RpcFrame::decode(&mut dec).map_err(|e| transport::Error::Io(e.to_string()))? else {
            return Err(transport::Error::Io("engine received a Reply frame".into()));
        };
        let request = call.request().map_err(|e| transport::Error::Io(e.to_string()))?;
        debug!(seq = call.seq, method = %call.method, "fake engine received request");

        let reply = (self.inner.handler)(&request);
        self.inner.requests.lock().await.push(request);

        if self.inner.muted.load(Ordering::Relaxed) {
            return Ok(None);
        }

        let bytes = match &reply {
            Ok(response) => ReplyEncoder::ok(call.seq, response).to_bytes(),
            Err(failure) => ReplyEncoder::err(call.seq, failure).to_bytes(),
        };
        bytes.map(Some).map_err(|e| transport::Error::Io(e.to_string()))
    }

    /// Serves this engine over TCP until the listener task is aborted.
    pub fn serve(&self, listener: TcpListener, max_frame_size: usize) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            while let Ok((mut stream, addr)) = listener.accept().await {
                debug!(%addr, "fake engine accepted connection");
                let engine = engine.clone();
                tokio::spawn(async move {
                    let (mut reader, mut writer) = stream.split();
                    while let Ok(Some(frame)) = tcp::read_frame(&mut reader, max_frame_size).await {
                        match engine.respond(&frame).await {
                            Ok(Some(reply)) => {
                                if tcp::write_frame(&mut writer, &reply, max_frame_size).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(_) => break,
                        }
                    }
                });
            }
        })
    }
}

/// Neutral answers: fresh addresses for new objects, `true` for destroy,
/// void for calls.
pub fn default_response(request: &Request) -> Response {
    use enginerpc::ObjectRef;
    use enginerpc::Payload;
    use enginerpc::WireValue;

    let void = || WireValue::new("ReturnValue", "void", Payload::Bool(false));
    match request {
        Request::NewObject { obj_name, own, .. } => {
            Response::NewObject { object: ObjectRef::new(own.address ^ 0xE000_0000_0000_0000, obj_name.clone()) }
        }
        Request::DestroyObject { .. } => Response::DestroyObject { result: true },
        Request::CallFunction { .. } => Response::CallFunction { ret: void(), out_params: vec![] },
        Request::CallStaticFunction { .. } => Response::CallStaticFunction { ret: void(), out_params: vec![] },
        Request::GetProperty { property_name, .. } => {
            Response::GetProperty { property: WireValue::new(property_name.clone(), "void", Payload::Bool(false)) }
        }
        Request::SetProperty { .. } => Response::SetProperty,
        Request::RegisterCreatedPyObject { .. } => Response::RegisterCreatedPyObject,
    }
}

/// One in-memory connection to a `FakeEngine`.
pub struct FakeTransport {
    engine: FakeEngine,
    id: usize,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

#[async_trait::async_trait]
impl Transport for FakeTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        let Some(link) = self.engine.inner.links.get(&self.id).map(|l| l.value().clone()) else {
            return Err(transport::Error::ConnectionLost("engine went away".into()));
        };
        if let Some(reply) = self.engine.respond(payload).await? {
            link.send(reply).map_err(|_| transport::Error::ConnectionLost("reply channel closed".into()))?;
        }
        Ok(())
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn close(&self) -> transport::Result<()> {
        self.engine.inner.links.remove(&self.id);
        Ok(())
    }
}

/// Connects only on the given ports and records every attempt.
pub struct FakeConnector {
    engine: FakeEngine,
    open_ports: Vec<u16>,
    attempts: Mutex<Vec<u16>>,
}

impl FakeConnector {
    pub fn new(engine: FakeEngine, open_ports: impl IntoIterator<Item = u16>) -> Self {
        Self { engine, open_ports: open_ports.into_iter().collect(), attempts: Mutex::new(Vec::new()) }
    }

    pub async fn attempts(&self) -> Vec<u16> {
        self.attempts.lock().await.clone()
    }

    pub fn engine(&self) -> &FakeEngine {
        &self.engine
    }
}

#[async_trait::async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, host: &str, port: u16) -> transport::Result<Box<dyn Transport>> {
        self.attempts.lock().await.push(port);
        if self.open_ports.contains(&port) {
            Ok(Box::new(self.engine.transport()))
        } else {
            Err(transport::Error::Io(format!("connection refused by {}:{}", host, port)))
        }
    }
}
