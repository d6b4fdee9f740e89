//! Transport module - bus endpoints and frame-level I/O.
//!
//! Provides the message-transport capability the broker consumes:
//! - Endpoint addressing over two schemes: `inproc://NAME` (in-process) and
//!   `ipc://PATH` (Unix domain socket)
//! - [`BusListener`] / [`BusStream`] for binding, accepting and connecting
//! - Length-prefixed frame assembly ([`FrameAssembler`]) and encoding

mod framing;
mod inproc;
#[cfg(unix)]
mod ipc;

pub use framing::{
    encode_frame, FrameAssembler, DEFAULT_MAX_FRAME_SIZE, LENGTH_PREFIX_SIZE,
};
pub use inproc::InprocListener;
#[cfg(unix)]
pub use ipc::IpcListener;

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::error::{BusError, Result};

/// A parsed endpoint address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointAddr {
    /// In-process endpoint, identified by name.
    Inproc(String),
    /// Unix-domain-socket endpoint, identified by path.
    #[cfg(unix)]
    Ipc(String),
}

impl EndpointAddr {
    /// Parse an endpoint address string.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Bind`] for unknown schemes or empty addresses;
    /// a malformed address can never be bound.
    pub fn parse(endpoint: &str) -> Result<Self> {
        let malformed = |reason: &str| BusError::Bind {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        if let Some(name) = endpoint.strip_prefix("inproc://") {
            if name.is_empty() {
                return Err(malformed("endpoint name is empty"));
            }
            return Ok(EndpointAddr::Inproc(name.to_string()));
        }

        #[cfg(unix)]
        if let Some(path) = endpoint.strip_prefix("ipc://") {
            if path.is_empty() {
                return Err(malformed("socket path is empty"));
            }
            return Ok(EndpointAddr::Ipc(path.to_string()));
        }

        Err(malformed("unsupported endpoint scheme"))
    }
}

/// Listener over any supported endpoint scheme.
pub enum BusListener {
    Inproc(InprocListener),
    #[cfg(unix)]
    Ipc(IpcListener),
}

impl BusListener {
    /// Parse and bind an endpoint address.
    pub fn bind(endpoint: &str) -> Result<Self> {
        match EndpointAddr::parse(endpoint)? {
            EndpointAddr::Inproc(name) => Ok(BusListener::Inproc(InprocListener::bind(&name)?)),
            #[cfg(unix)]
            EndpointAddr::Ipc(path) => Ok(BusListener::Ipc(IpcListener::bind(&path)?)),
        }
    }

    /// Accept a single connection.
    pub async fn accept(&mut self) -> Result<BusStream> {
        match self {
            BusListener::Inproc(listener) => Ok(BusStream::Inproc(listener.accept().await?)),
            #[cfg(unix)]
            BusListener::Ipc(listener) => Ok(BusStream::Ipc(listener.accept().await?)),
        }
    }
}

/// A connected bus stream over any supported endpoint scheme.
pub enum BusStream {
    Inproc(DuplexStream),
    #[cfg(unix)]
    Ipc(UnixStream),
}

impl BusStream {
    /// Split into read and write halves.
    pub fn into_split(
        self,
    ) -> (tokio::io::ReadHalf<BusStream>, tokio::io::WriteHalf<BusStream>) {
        tokio::io::split(self)
    }
}

/// Connect to a bound bus endpoint, as a module or tool joining the bus.
pub async fn connect(endpoint: &str) -> Result<BusStream> {
    match EndpointAddr::parse(endpoint)? {
        EndpointAddr::Inproc(name) => Ok(BusStream::Inproc(inproc::connect(&name)?)),
        #[cfg(unix)]
        EndpointAddr::Ipc(path) => Ok(BusStream::Ipc(ipc::connect(&path).await?)),
    }
}

impl AsyncRead for BusStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            BusStream::Inproc(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            BusStream::Ipc(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for BusStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            BusStream::Inproc(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            BusStream::Ipc(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            BusStream::Inproc(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            BusStream::Ipc(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            BusStream::Inproc(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            BusStream::Ipc(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}
