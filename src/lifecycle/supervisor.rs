//! The server supervisor.
//!
//! # Responsibilities
//! - Own the lifecycle state machine and enforce its transition rules
//! - Drive ordered observer startup and shutdown with compensating rollback
//! - Configure ALPN on TLS listeners between observer startup and the
//!   first accept
//! - Spawn and cancel the accept loops
//! - Bound `stop()` by the shutdown deadline while shutdown itself always
//!   runs to completion
//!
//! # Design Decisions
//! - Supervisor state lives behind one mutex and is only mutated in
//!   synchronous sections; the suspension points are the observer
//!   fan-outs, the accept waits, and the shutdown drain
//! - The observer set for a cycle is rebuilt at every start: the time
//!   reference first, then the driver factory's and responder's observers,
//!   then everything attached while stopped

use futures_util::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::config::ServerOptions;
use crate::http::{
    DefaultErrorHandler, ErrorHandler, HttpDriverFactory, NullDriverFactory, Responder,
};
use crate::lifecycle::accept::accept_loop;
use crate::lifecycle::error::{BoxError, ServerError};
use crate::lifecycle::observer::{push_unique, LifecycleObserver};
use crate::lifecycle::registry::ClientRegistry;
use crate::lifecycle::state::ServerState;
use crate::net::client::ConnectionId;
use crate::net::listener::BoundListener;
use crate::time::reference::TimeReference;

pub(crate) struct ServerInner {
    pub(crate) options: Arc<ServerOptions>,
    pub(crate) state: Mutex<ServerState>,
    pub(crate) listeners: Vec<Arc<BoundListener>>,
    pub(crate) responder: Arc<dyn Responder>,
    pub(crate) driver_factory: Mutex<Arc<dyn HttpDriverFactory>>,
    pub(crate) error_handler: Mutex<Arc<dyn ErrorHandler>>,
    observers: Mutex<Vec<Arc<dyn LifecycleObserver>>>,
    cycle_observers: Mutex<Vec<Arc<dyn LifecycleObserver>>>,
    pub(crate) time: TimeReference,
    pub(crate) registry: Arc<ClientRegistry>,
    accept_tasks: Mutex<Vec<JoinHandle<()>>>,
    next_connection_id: AtomicU64,
}

/// The server lifecycle supervisor.
///
/// Cheap to clone; all clones share one supervisor. Construction takes the
/// already-bound listeners, the application responder, and the option
/// bundle. The protocol driver factory and the error handler start as
/// built-in defaults and are replaced while the server is stopped.
#[derive(Clone)]
pub struct Server {
    pub(crate) inner: Arc<ServerInner>,
}

impl Server {
    /// Build a server over already-bound listeners.
    pub fn new(
        listeners: Vec<BoundListener>,
        responder: Arc<dyn Responder>,
        options: ServerOptions,
    ) -> Self {
        let registry = Arc::new(ClientRegistry::new());
        let time = TimeReference::new();

        // The timeout sweep lives for the registry, not the cycle: it is
        // subscribed once and only sees ticks while the clock runs.
        let sweeper = Arc::downgrade(&registry);
        time.subscribe(move |now| {
            if let Some(registry) = sweeper.upgrade() {
                registry.close_expired(now);
            }
        });

        Self {
            inner: Arc::new(ServerInner {
                options: Arc::new(options),
                state: Mutex::new(ServerState::Stopped),
                listeners: listeners.into_iter().map(Arc::new).collect(),
                responder,
                driver_factory: Mutex::new(Arc::new(NullDriverFactory)),
                error_handler: Mutex::new(Arc::new(DefaultErrorHandler)),
                observers: Mutex::new(Vec::new()),
                cycle_observers: Mutex::new(Vec::new()),
                time,
                registry,
                accept_tasks: Mutex::new(Vec::new()),
                next_connection_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.inner.state.lock().expect("state lock poisoned")
    }

    /// The option bundle the server was built with.
    pub fn options(&self) -> &ServerOptions {
        &self.inner.options
    }

    /// The currently installed error handler.
    pub fn error_handler(&self) -> Arc<dyn ErrorHandler> {
        self.inner
            .error_handler
            .lock()
            .expect("error handler lock poisoned")
            .clone()
    }

    /// The shared coarse clock.
    pub fn time_reference(&self) -> &TimeReference {
        &self.inner.time
    }

    /// Number of connections currently registered.
    pub fn connection_count(&self) -> usize {
        self.inner.registry.connection_count()
    }

    /// Attach a lifecycle observer. Only valid while stopped.
    ///
    /// Attaching the same instance twice keeps one entry.
    pub fn attach_observer(
        &self,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Result<(), ServerError> {
        let state = self.inner.state.lock().expect("state lock poisoned");
        require_stopped("attach_observer", *state)?;
        push_unique(
            &mut self.inner.observers.lock().expect("observer lock poisoned"),
            observer,
        );
        Ok(())
    }

    /// Replace the protocol driver factory. Only valid while stopped.
    pub fn set_driver_factory(
        &self,
        factory: Arc<dyn HttpDriverFactory>,
    ) -> Result<(), ServerError> {
        let state = self.inner.state.lock().expect("state lock poisoned");
        require_stopped("set_driver_factory", *state)?;
        *self
            .inner
            .driver_factory
            .lock()
            .expect("driver factory lock poisoned") = factory;
        Ok(())
    }

    /// Replace the error handler. Only valid while stopped.
    pub fn set_error_handler(&self, handler: Arc<dyn ErrorHandler>) -> Result<(), ServerError> {
        let state = self.inner.state.lock().expect("state lock poisoned");
        require_stopped("set_error_handler", *state)?;
        *self
            .inner
            .error_handler
            .lock()
            .expect("error handler lock poisoned") = handler;
        Ok(())
    }

    /// Start the server.
    ///
    /// Resolves once every observer's `on_start` has completed and every
    /// listener has an accept loop. If any observer fails, the full
    /// shutdown sequence runs before the error is returned, so every
    /// observer of the cycle still sees `on_stop`.
    pub async fn start(&self) -> Result<(), ServerError> {
        {
            let mut state = self.inner.state.lock().expect("state lock poisoned");
            if *state != ServerState::Stopped {
                return Err(ServerError::InvalidState {
                    operation: "start",
                    expected: ServerState::Stopped,
                    actual: *state,
                });
            }
            *state = ServerState::Starting;
        }
        tracing::info!(listeners = self.inner.listeners.len(), "Server starting");

        let factory = self
            .inner
            .driver_factory
            .lock()
            .expect("driver factory lock poisoned")
            .clone();

        let cycle = {
            let mut cycle: Vec<Arc<dyn LifecycleObserver>> = Vec::new();
            push_unique(&mut cycle, Arc::new(self.inner.time.clone()));
            if let Some(observer) = factory.observer() {
                push_unique(&mut cycle, observer);
            }
            if let Some(observer) = self.inner.responder.observer() {
                push_unique(&mut cycle, observer);
            }
            for observer in self
                .inner
                .observers
                .lock()
                .expect("observer lock poisoned")
                .iter()
            {
                push_unique(&mut cycle, observer.clone());
            }
            cycle
        };
        *self
            .inner
            .cycle_observers
            .lock()
            .expect("cycle observer lock poisoned") = cycle.clone();

        let results = join_all(cycle.iter().map(|observer| observer.on_start(self))).await;
        if let Some(cause) = results.into_iter().find_map(Result::err) {
            tracing::error!(error = %cause, "Observer startup failed, rolling back");
            *self.inner.state.lock().expect("state lock poisoned") = ServerState::Stopping;
            self.shutdown_sequence().await;
            return Err(ServerError::Startup(cause));
        }

        *self.inner.state.lock().expect("state lock poisoned") = ServerState::Started;

        // ALPN goes on after observers ran: a factory may only know its
        // final protocol list once its own startup completed.
        let protocols = factory.application_layer_protocols();
        if !protocols.is_empty() {
            for listener in &self.inner.listeners {
                if let Some(tls) = listener.tls() {
                    tls.set_alpn_protocols(&protocols);
                    tracing::debug!(
                        address = %listener.address(),
                        protocols = ?protocols,
                        "ALPN protocols configured"
                    );
                }
            }
        }

        let mut tasks = Vec::with_capacity(self.inner.listeners.len());
        for listener in &self.inner.listeners {
            tracing::info!(address = %listener.address(), "Listening for connections");
            tasks.push(tokio::spawn(accept_loop(self.clone(), listener.clone())));
        }
        *self
            .inner
            .accept_tasks
            .lock()
            .expect("accept task lock poisoned") = tasks;

        tracing::info!("Server started");
        Ok(())
    }

    /// Stop the server under the configured deadline.
    ///
    /// Stopping an already stopped server is a no-op. When the deadline
    /// trips the caller gets [`ServerError::ShutdownTimedOut`], but the
    /// shutdown keeps running in the background until the state machine
    /// reaches stopped.
    pub async fn stop(&self) -> Result<(), ServerError> {
        {
            let mut state = self.inner.state.lock().expect("state lock poisoned");
            match *state {
                ServerState::Stopped => return Ok(()),
                ServerState::Starting | ServerState::Stopping => {
                    return Err(ServerError::InvalidState {
                        operation: "stop",
                        expected: ServerState::Started,
                        actual: *state,
                    });
                }
                ServerState::Started => *state = ServerState::Stopping,
            }
        }
        tracing::info!("Server stopping");

        let server = self.clone();
        let sequence = tokio::spawn(async move { server.shutdown_sequence().await });

        match tokio::time::timeout(self.inner.options.shutdown_timeout(), sequence).await {
            Ok(Ok(None)) => Ok(()),
            Ok(Ok(Some(cause))) => Err(ServerError::Shutdown(cause)),
            Ok(Err(join_error)) => Err(ServerError::Shutdown(Box::new(join_error))),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.inner.options.shutdown_timeout_secs,
                    "Shutdown deadline exceeded, continuing in the background"
                );
                Err(ServerError::ShutdownTimedOut {
                    timeout_secs: self.inner.options.shutdown_timeout_secs,
                })
            }
        }
    }

    /// Run the shutdown steps. The state must already be stopping.
    ///
    /// Returns the first observer failure, after every step has run.
    async fn shutdown_sequence(&self) -> Option<BoxError> {
        let tasks = std::mem::take(
            &mut *self
                .inner
                .accept_tasks
                .lock()
                .expect("accept task lock poisoned"),
        );
        for task in &tasks {
            task.abort();
        }
        tracing::debug!(watchers = tasks.len(), "Accept watchers cancelled");

        let observers = std::mem::take(
            &mut *self
                .inner
                .cycle_observers
                .lock()
                .expect("cycle observer lock poisoned"),
        );
        let results = join_all(observers.iter().map(|observer| observer.on_stop(self))).await;
        let mut first_failure = None;
        for error in results.into_iter().filter_map(Result::err) {
            tracing::warn!(error = %error, "Observer failed during shutdown");
            if first_failure.is_none() {
                first_failure = Some(error);
            }
        }

        let closing = self.inner.registry.close_all();
        if closing > 0 {
            tracing::info!(connections = closing, "Closing active connections");
        }
        self.inner.registry.wait_all_closed().await;

        *self.inner.state.lock().expect("state lock poisoned") = ServerState::Stopped;
        tracing::info!("Server stopped");
        first_failure
    }

    pub(crate) fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.inner.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state())
            .field("listeners", &self.inner.listeners.len())
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

fn require_stopped(operation: &'static str, state: ServerState) -> Result<(), ServerError> {
    if state != ServerState::Stopped {
        return Err(ServerError::InvalidState {
            operation,
            expected: ServerState::Stopped,
            actual: state,
        });
    }
    Ok(())
}
