//! Shared utilities for lifecycle integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use portico::{
    BoundListener, BoxError, Client, HttpDriver, HttpDriverFactory, LifecycleObserver, Request,
    Responder, Response, Server, ServerOptions,
};

/// Options with every knob explicit, so tests read as scenarios.
#[allow(dead_code)]
pub fn options(
    connection_timeout_secs: u64,
    shutdown_timeout_secs: u64,
    max_connections: usize,
    max_connections_per_peer: usize,
) -> ServerOptions {
    ServerOptions {
        connection_timeout_secs,
        shutdown_timeout_secs,
        max_connections,
        max_connections_per_peer,
    }
}

/// Bind a loopback listener on an ephemeral port.
#[allow(dead_code)]
pub async fn bound_listener() -> (BoundListener, SocketAddr) {
    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (BoundListener::from_tcp(socket, None), addr)
}

/// Poll a condition until it holds or a 5 second deadline passes.
#[allow(dead_code)]
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not met within deadline");
}

/// Responder that never gets called; the test drivers do not parse.
pub struct NoopResponder;

#[async_trait]
impl Responder for NoopResponder {
    async fn respond(&self, _request: Request) -> Response {
        Response::new(Vec::new())
    }
}

/// Factory whose drivers hold the connection open without reading.
///
/// The connection only closes when the server closes it, which is exactly
/// what admission, idle-timeout, and shutdown tests need to observe.
pub struct HoldOpenFactory {
    created: AtomicUsize,
    protocols: Vec<String>,
}

#[allow(dead_code)]
impl HoldOpenFactory {
    pub fn new() -> Self {
        Self {
            created: AtomicUsize::new(0),
            protocols: Vec::new(),
        }
    }

    pub fn with_protocols(protocols: &[&str]) -> Self {
        Self {
            created: AtomicUsize::new(0),
            protocols: protocols.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

struct HoldOpenDriver;

#[async_trait]
impl HttpDriver for HoldOpenDriver {
    async fn serve(self: Box<Self>, mut client: Client) -> std::io::Result<()> {
        let mut buf = [0u8; 1024];
        loop {
            // Bytes are swallowed and the deadline is never renewed.
            match client.read(&mut buf).await {
                Ok(0) => return Ok(()),
                Ok(_) => {}
                Err(error) => return Err(error),
            }
        }
    }
}

impl HttpDriverFactory for HoldOpenFactory {
    fn application_layer_protocols(&self) -> Vec<String> {
        self.protocols.clone()
    }

    fn create_driver(&self, _client: &Client) -> Box<dyn HttpDriver> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(HoldOpenDriver)
    }
}

/// Observer that records its lifecycle events, with injectable failures
/// and a configurable shutdown stall.
pub struct RecordingObserver {
    name: &'static str,
    events: Arc<Mutex<Vec<String>>>,
    fail_on_start: bool,
    fail_on_stop: bool,
    start_delay: Duration,
    stop_delay: Duration,
}

#[allow(dead_code)]
impl RecordingObserver {
    pub fn new(name: &'static str, events: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            events,
            fail_on_start: false,
            fail_on_stop: false,
            start_delay: Duration::ZERO,
            stop_delay: Duration::ZERO,
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_on_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_on_stop = true;
        self
    }

    pub fn slow_start(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn slow_stop(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }
}

#[async_trait]
impl LifecycleObserver for RecordingObserver {
    async fn on_start(&self, _server: &Server) -> Result<(), BoxError> {
        if self.start_delay > Duration::ZERO {
            tokio::time::sleep(self.start_delay).await;
        }
        self.events
            .lock()
            .unwrap()
            .push(format!("{}:start", self.name));
        if self.fail_on_start {
            return Err(format!("{} refused to start", self.name).into());
        }
        Ok(())
    }

    async fn on_stop(&self, _server: &Server) -> Result<(), BoxError> {
        if self.stop_delay > Duration::ZERO {
            tokio::time::sleep(self.stop_delay).await;
        }
        self.events
            .lock()
            .unwrap()
            .push(format!("{}:stop", self.name));
        if self.fail_on_stop {
            return Err(format!("{} refused to stop", self.name).into());
        }
        Ok(())
    }
}

/// Events recorded so far.
#[allow(dead_code)]
pub fn events_snapshot(events: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    events.lock().unwrap().clone()
}
