//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Embedder binds socket
//!     → listener.rs (BoundListener, non-blocking accept)
//!     → peer.rs (network key, loopback exemption)
//!     → client.rs (Client handle, handed to the protocol driver)
//!     → tls.rs (per-listener TLS context, ALPN applied at startup)
//! ```

pub mod client;
pub mod listener;
pub mod peer;
pub mod tls;

pub use client::{Client, ClientStream, ConnectionId, RemoteAddr};
pub use listener::BoundListener;
pub use peer::{is_loopback, PeerKey};
pub use tls::TlsContext;
