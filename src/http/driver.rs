//! Protocol driver interface.
//!
//! The lifecycle core does not parse HTTP. Every accepted connection is
//! handed to a driver produced by the installed factory; the driver owns
//! the socket pumps from that point and reports progress by renewing the
//! client's timeout entry.

use async_trait::async_trait;
use std::sync::Arc;

use crate::lifecycle::observer::LifecycleObserver;
use crate::net::client::Client;

/// Per-connection protocol state machine.
#[async_trait]
pub trait HttpDriver: Send {
    /// Run the connection to completion.
    ///
    /// Owns the client for the connection's lifetime; returning (or the
    /// future being dropped when the server closes the connection) releases
    /// the socket and the registry slot.
    async fn serve(self: Box<Self>, client: Client) -> std::io::Result<()>;
}

/// Factory supplying drivers and protocol metadata.
pub trait HttpDriverFactory: Send + Sync {
    /// Protocols to advertise via ALPN on TLS listeners, preference first,
    /// for example `["h2", "http/1.1"]`. An empty list disables ALPN.
    fn application_layer_protocols(&self) -> Vec<String>;

    /// Build the driver for one accepted connection.
    fn create_driver(&self, client: &Client) -> Box<dyn HttpDriver>;

    /// Lifecycle observer for the factory, if it needs startup/shutdown
    /// hooks. Included in the startup fan-out when present.
    fn observer(&self) -> Option<Arc<dyn LifecycleObserver>> {
        None
    }
}

/// Placeholder factory installed until the embedder provides a real
/// protocol driver. Advertises no protocols; its driver closes every
/// connection without reading.
#[derive(Debug, Default)]
pub struct NullDriverFactory;

struct NullDriver;

#[async_trait]
impl HttpDriver for NullDriver {
    async fn serve(self: Box<Self>, client: Client) -> std::io::Result<()> {
        tracing::debug!(connection = %client.id(), "No driver installed, closing connection");
        Ok(())
    }
}

impl HttpDriverFactory for NullDriverFactory {
    fn application_layer_protocols(&self) -> Vec<String> {
        Vec::new()
    }

    fn create_driver(&self, _client: &Client) -> Box<dyn HttpDriver> {
        Box::new(NullDriver)
    }
}
