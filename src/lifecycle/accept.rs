//! Accept loops and connection handoff.
//!
//! # Data Flow
//! ```text
//! Readable listener
//!     → non-blocking accept (transient errors ignored)
//!     → admission control (registry.rs)
//!     → Client construction
//!     → driver task (protocol handoff)
//! ```

use std::io::ErrorKind;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::lifecycle::registry::{Admission, TimeoutHandle};
use crate::lifecycle::supervisor::Server;
use crate::net::client::{Client, ClientStream, RemoteAddr};
use crate::net::listener::BoundListener;
use crate::net::peer::{is_loopback, PeerKey};
use crate::observability::metrics;

/// Accept connections on one listener until the task is cancelled.
///
/// A fatal accept error closes only this listener; the rest of the server
/// keeps serving. Whether a server without listeners should stop is the
/// operator's call, not ours.
pub(crate) async fn accept_loop(server: Server, listener: Arc<BoundListener>) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => server.handle_accept(&listener, stream, remote),
            Err(error) if is_transient(&error) => {
                tracing::debug!(
                    address = %listener.address(),
                    error = %error,
                    "Transient accept error"
                );
            }
            Err(error) => {
                tracing::error!(
                    address = %listener.address(),
                    error = %error,
                    "Listener failed, closing it"
                );
                break;
            }
        }
    }
}

/// Accept errors that the next readable event resolves on its own.
fn is_transient(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
    )
}

impl Server {
    /// Admit one accepted socket and hand it to the protocol driver.
    ///
    /// Runs synchronously on the accept loop; all bookkeeping happens
    /// before the next accept. A rejected socket is dropped here, which
    /// closes it.
    pub(crate) fn handle_accept(
        &self,
        listener: &BoundListener,
        stream: ClientStream,
        remote: RemoteAddr,
    ) {
        let id = self.next_connection_id();
        let (peer, exempt) = match remote {
            RemoteAddr::Tcp(addr) => (PeerKey::from_ip(addr.ip()), is_loopback(addr.ip())),
            #[cfg(unix)]
            RemoteAddr::Unix => (PeerKey::Unix, true),
        };

        let closer = Arc::new(Notify::new());
        let options = &self.inner.options;
        let expires_at = self.inner.time.now() + options.connection_timeout_secs;
        let admission = self.inner.registry.try_register(
            id,
            peer.clone(),
            exempt,
            closer.clone(),
            expires_at,
            options,
        );

        let guard = match admission {
            Admission::TooManyTotal => {
                tracing::debug!(remote = %remote, "Client denied: too many existing connections");
                metrics::record_denied("global_cap");
                return;
            }
            Admission::TooManyForPeer => {
                tracing::debug!(
                    remote = %remote,
                    peer = %peer,
                    "Client denied: too many connections for peer"
                );
                metrics::record_denied("peer_cap");
                return;
            }
            Admission::Admitted(guard) => guard,
        };

        let factory = self
            .inner
            .driver_factory
            .lock()
            .expect("driver factory lock poisoned")
            .clone();
        let error_handler = self
            .inner
            .error_handler
            .lock()
            .expect("error handler lock poisoned")
            .clone();
        let timeout = TimeoutHandle::new(
            self.inner.registry.clone(),
            self.inner.time.clone(),
            id,
            options.connection_timeout_secs,
        );
        let client = Client::new(
            stream,
            id,
            remote,
            peer,
            listener.tls().map(|tls| tls.snapshot()),
            self.inner.responder.clone(),
            error_handler,
            self.inner.options.clone(),
            timeout,
            guard,
        );

        tracing::debug!(connection = %id, remote = %remote, "Client connected");
        metrics::record_accepted();

        tokio::spawn(async move {
            let driver = factory.create_driver(&client);
            tokio::select! {
                _ = closer.notified() => {
                    tracing::debug!(connection = %id, "Connection closed by server");
                }
                result = driver.serve(client) => {
                    if let Err(error) = result {
                        tracing::debug!(connection = %id, error = %error, "Driver finished with error");
                    }
                }
            }
        });
    }
}
