//! Bound listener wrapper.
//!
//! # Responsibilities
//! - Hold already-bound listening sockets handed over at server construction
//! - Accept incoming connections without blocking the supervisor
//! - Carry the optional TLS context for the address
//!
//! The server never binds sockets itself; the embedder binds and passes
//! listeners in, which keeps privilege handling and socket options outside
//! the lifecycle core.

use std::net::SocketAddr;
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;

use crate::net::client::{ClientStream, RemoteAddr};
use crate::net::tls::TlsContext;

enum ListenerSocket {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// An already-bound listening socket owned by the server.
pub struct BoundListener {
    socket: ListenerSocket,
    address: String,
    tls: Option<TlsContext>,
}

impl BoundListener {
    /// Wrap a bound TCP listener, optionally terminating TLS.
    pub fn from_tcp(listener: TcpListener, tls: Option<TlsContext>) -> Self {
        let address = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        Self {
            socket: ListenerSocket::Tcp(listener),
            address,
            tls,
        }
    }

    /// Wrap a bound Unix-domain listener.
    #[cfg(unix)]
    pub fn from_unix(listener: UnixListener) -> Self {
        let address = listener
            .local_addr()
            .ok()
            .and_then(|a| a.as_pathname().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "<unix>".to_string());
        Self {
            socket: ListenerSocket::Unix(listener),
            address,
            tls: None,
        }
    }

    /// Human-readable bind address, for logging.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The TCP address the listener is bound to, if it is a TCP listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.socket {
            ListenerSocket::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            ListenerSocket::Unix(_) => None,
        }
    }

    /// The TLS context for this address, if one was attached.
    pub fn tls(&self) -> Option<&TlsContext> {
        self.tls.as_ref()
    }

    /// Accept one connection.
    pub async fn accept(&self) -> std::io::Result<(ClientStream, RemoteAddr)> {
        match &self.socket {
            ListenerSocket::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                Ok((ClientStream::Tcp(stream), RemoteAddr::Tcp(addr)))
            }
            #[cfg(unix)]
            ListenerSocket::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok((ClientStream::Unix(stream), RemoteAddr::Unix))
            }
        }
    }
}

impl std::fmt::Debug for BoundListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundListener")
            .field("address", &self.address)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}
