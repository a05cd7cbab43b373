//! TLS context handling for bound listeners.
//!
//! # Responsibilities
//! - Carry the rustls server config attached to a listener
//! - Apply the driver factory's ALPN protocol list after observer startup
//! - Hand per-connection snapshots to the protocol driver
//!
//! # Design Decisions
//! - Uses rustls (no OpenSSL dependency)
//! - The handshake itself belongs to the driver; the core only configures

use std::sync::{Arc, Mutex};

/// Shared TLS context for a bound listener.
///
/// The supervisor updates the ALPN protocol list between observer startup
/// and the first accept, so the config lives behind a mutex and drivers
/// take an [`Arc`] snapshot per connection.
#[derive(Clone)]
pub struct TlsContext {
    shared: Arc<Mutex<Arc<rustls::ServerConfig>>>,
}

impl TlsContext {
    /// Wrap an already-built rustls server config.
    pub fn new(config: rustls::ServerConfig) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Arc::new(config))),
        }
    }

    /// Replace the ALPN protocol list on the config.
    pub fn set_alpn_protocols(&self, protocols: &[String]) {
        let mut guard = self.shared.lock().expect("tls config lock poisoned");
        let mut config = (**guard).clone();
        config.alpn_protocols = protocols.iter().map(|p| p.as_bytes().to_vec()).collect();
        *guard = Arc::new(config);
    }

    /// The currently configured ALPN protocols, textualized.
    pub fn alpn_protocols(&self) -> Vec<String> {
        let guard = self.shared.lock().expect("tls config lock poisoned");
        guard
            .alpn_protocols
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect()
    }

    /// Snapshot of the config for a single connection.
    pub fn snapshot(&self) -> Arc<rustls::ServerConfig> {
        self.shared
            .lock()
            .expect("tls config lock poisoned")
            .clone()
    }
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("alpn_protocols", &self.alpn_protocols())
            .finish_non_exhaustive()
    }
}
