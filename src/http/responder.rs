//! Application request handling interface.

use async_trait::async_trait;
use std::sync::Arc;

use crate::lifecycle::observer::LifecycleObserver;

/// A parsed request as produced by the protocol driver.
pub type Request = http::Request<Vec<u8>>;

/// A response for the protocol driver to serialize.
pub type Response = http::Response<Vec<u8>>;

/// The application request handler.
///
/// The driver parses requests off the wire and calls this; the lifecycle
/// core only carries the reference.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce the response for one request.
    async fn respond(&self, request: Request) -> Response;

    /// Lifecycle observer for the responder, if it needs startup/shutdown
    /// hooks. Included in the startup fan-out when present.
    fn observer(&self) -> Option<Arc<dyn LifecycleObserver>> {
        None
    }
}
