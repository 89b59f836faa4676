//! # TCP Transport
//!
//! Length-prefixed framing over a TCP stream.
//!
//! ```text
//! [u32 BE: len][enginepack document of len bytes]
//! ```
//!
//! The stream is split so the peer's pump can block in `recv` while callers
//! keep sending.

use std::net::SocketAddr;

use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;
use tracing::debug;

use crate::connection::Connector;
use crate::transport;
use crate::transport::Transport;

/// Reads one length-prefixed frame.
///
/// Returns `None` on clean EOF before a header starts.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_frame_size: usize,
) -> transport::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_frame_size {
        return Err(transport::Error::PayloadTooLarge { size: len, max: max_frame_size });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Writes one length-prefixed frame and flushes.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
    max_frame_size: usize,
) -> transport::Result<()> {
    if payload.len() > max_frame_size || payload.len() > u32::MAX as usize {
        return Err(transport::Error::PayloadTooLarge { size: payload.len(), max: max_frame_size });
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// A framed transport over a connected TCP stream.
pub struct TcpTransport {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    remote: SocketAddr,
    max_frame_size: usize,
}

impl TcpTransport {
    pub fn new(stream: TcpStream, max_frame_size: usize) -> transport::Result<Self> {
        stream.set_nodelay(true)?;
        let remote = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            remote,
            max_frame_size,
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&self, payload: &[u8]) -> transport::Result<()> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, payload, self.max_frame_size).await
    }

    async fn recv(&self) -> transport::Result<Option<Vec<u8>>> {
        let mut reader = self.reader.lock().await;
        read_frame(&mut *reader, self.max_frame_size).await
    }

    async fn close(&self) -> transport::Result<()> {
        let mut writer = self.writer.lock().await;
        match writer.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Opens TCP connections to the engine.
pub struct TcpConnector {
    max_frame_size: usize,
}

impl TcpConnector {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> transport::Result<Box<dyn Transport>> {
        let stream = TcpStream::connect((host, port)).await?;
        let transport = TcpTransport::new(stream, self.max_frame_size)?;
        debug!(remote = %transport.remote_addr(), "tcp transport established");
        Ok(Box::new(transport))
    }
}
