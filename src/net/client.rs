//! Accepted-connection handle passed to the protocol driver.
//!
//! # Responsibilities
//! - Own the accepted socket and the collaborators the driver needs
//! - Expose timeout renewal so the driver can report progress
//! - Release registry bookkeeping exactly once when the driver lets go
//!
//! # Design Decisions
//! - The registry guard is the last field, so the socket closes before the
//!   close bookkeeping runs
//! - `Client` forwards `AsyncRead`/`AsyncWrite` to the underlying stream,
//!   letting drivers pump it directly

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::config::ServerOptions;
use crate::http::{ErrorHandler, Responder};
use crate::lifecycle::registry::{ClientGuard, TimeoutHandle};
use crate::net::peer::PeerKey;

/// Process-local identifier for an accepted connection.
///
/// Assigned from a monotonic counter, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    /// Returns the raw numeric identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote endpoint of an accepted connection.
#[derive(Debug, Clone, Copy)]
pub enum RemoteAddr {
    /// TCP peer with address and port.
    Tcp(SocketAddr),
    /// Unix-domain peer.
    #[cfg(unix)]
    Unix,
}

impl std::fmt::Display for RemoteAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteAddr::Tcp(addr) => write!(f, "{}", addr),
            #[cfg(unix)]
            RemoteAddr::Unix => write!(f, "unix"),
        }
    }
}

/// Accepted socket, independent of listener family.
pub enum ClientStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AsyncRead for ClientStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ClientStream::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            ClientStream::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ClientStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            ClientStream::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            ClientStream::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ClientStream::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            ClientStream::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ClientStream::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            ClientStream::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Server-side handle for one accepted connection.
///
/// Handed to the protocol driver at accept time. Dropping the client closes
/// the socket and releases its registry slot.
pub struct Client {
    stream: ClientStream,
    id: ConnectionId,
    remote: RemoteAddr,
    peer: PeerKey,
    tls: Option<Arc<rustls::ServerConfig>>,
    responder: Arc<dyn Responder>,
    error_handler: Arc<dyn ErrorHandler>,
    options: Arc<ServerOptions>,
    timeout: TimeoutHandle,
    _guard: ClientGuard,
}

impl Client {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        stream: ClientStream,
        id: ConnectionId,
        remote: RemoteAddr,
        peer: PeerKey,
        tls: Option<Arc<rustls::ServerConfig>>,
        responder: Arc<dyn Responder>,
        error_handler: Arc<dyn ErrorHandler>,
        options: Arc<ServerOptions>,
        timeout: TimeoutHandle,
        guard: ClientGuard,
    ) -> Self {
        Self {
            stream,
            id,
            remote,
            peer,
            tls,
            responder,
            error_handler,
            options,
            timeout,
            _guard: guard,
        }
    }

    /// The connection identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote endpoint of the connection.
    pub fn remote_addr(&self) -> RemoteAddr {
        self.remote
    }

    /// Network key the connection is counted under.
    pub fn peer(&self) -> &PeerKey {
        &self.peer
    }

    /// Whether the connection arrived on a Unix-domain listener.
    pub fn is_unix(&self) -> bool {
        matches!(self.peer, PeerKey::Unix)
    }

    /// TLS config snapshot for the listener, if it terminates TLS.
    ///
    /// The driver performs the handshake; the core only carries the config.
    pub fn tls_config(&self) -> Option<Arc<rustls::ServerConfig>> {
        self.tls.clone()
    }

    /// The application responder.
    pub fn responder(&self) -> &Arc<dyn Responder> {
        &self.responder
    }

    /// The error-page handler.
    pub fn error_handler(&self) -> &Arc<dyn ErrorHandler> {
        &self.error_handler
    }

    /// Server options in effect for this connection.
    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Push the idle deadline out by `connection_timeout` from now.
    ///
    /// Drivers call this on every byte of progress; a connection that stops
    /// renewing is closed by the timeout sweep.
    pub fn renew_timeout(&self) {
        self.timeout.renew();
    }

    /// Remove the connection from timeout tracking entirely.
    ///
    /// For protocol states that legitimately idle, such as an upgraded
    /// connection with its own keepalive.
    pub fn clear_timeout(&self) {
        self.timeout.clear();
    }

    /// Mutable access to the underlying stream.
    pub fn stream_mut(&mut self) -> &mut ClientStream {
        &mut self.stream
    }
}

impl AsyncRead for Client {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for Client {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("remote", &self.remote)
            .field("peer", &self.peer.to_string())
            .finish_non_exhaustive()
    }
}
