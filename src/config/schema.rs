//! Configuration schema definitions.
//!
//! This module defines the option bundle consumed by the server supervisor.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable option bundle for the server supervisor.
///
/// Options are fixed for the lifetime of a server once it is constructed;
/// changing limits requires building a new server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Seconds a connection may sit without driver progress before it is
    /// closed by the timeout sweep.
    pub connection_timeout_secs: u64,

    /// Deadline in seconds for `stop()` to resolve. Shutdown keeps running
    /// in the background when the deadline trips.
    pub shutdown_timeout_secs: u64,

    /// Maximum concurrent connections across all listeners and peers.
    pub max_connections: usize,

    /// Maximum concurrent connections per peer network. Loopback and
    /// Unix-domain peers are exempt from this cap (but not the global one).
    pub max_connections_per_peer: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 15,
            shutdown_timeout_secs: 3,
            max_connections: 10_000,
            max_connections_per_peer: 30,
        }
    }
}

impl ServerOptions {
    /// The shutdown deadline as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// The idle timeout as a [`Duration`].
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}
