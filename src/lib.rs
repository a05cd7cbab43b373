//! Portico: lifecycle core for a concurrent HTTP server.
//!
//! Portico supervises the part of an HTTP server that is not HTTP: it owns
//! already-bound listeners, admits connections under global and per-peer
//! caps, evicts idle connections through one shared coarse clock, and runs
//! an ordered startup/shutdown protocol across pluggable observers. Wire
//! parsing and request handling stay outside, behind the driver and
//! responder interfaces.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                    SUPERVISOR                    │
//!                 │                                                  │
//!  Bound sockets  │  ┌──────────┐   ┌───────────┐   ┌────────────┐  │
//!  ───────────────┼─▶│   net    │──▶│ admission │──▶│ connection │  │
//!                 │  │ listener │   │  control  │   │  registry  │  │
//!                 │  └──────────┘   └───────────┘   └─────┬──────┘  │
//!                 │                                       │         │
//!                 │                                       ▼         │
//!                 │  ┌──────────┐   ┌───────────┐   ┌────────────┐  │   HTTP driver
//!                 │  │   time   │──▶│  timeout  │   │   client   │──┼─▶ (external)
//!                 │  │reference │   │   sweep   │   │  handoff   │  │
//!                 │  └──────────┘   └───────────┘   └────────────┘  │
//!                 │                                                  │
//!                 │  ┌────────────────────────────────────────────┐  │
//!                 │  │            Cross-Cutting Concerns           │  │
//!                 │  │  ┌────────┐ ┌───────────┐ ┌─────────────┐  │  │
//!                 │  │  │ config │ │ observers │ │observability│  │  │
//!                 │  │  └────────┘ └───────────┘ └─────────────┘  │  │
//!                 │  └────────────────────────────────────────────┘  │
//!                 └──────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use portico::{BoundListener, Server, ServerOptions};
//! use std::sync::Arc;
//!
//! # struct App;
//! # #[async_trait::async_trait]
//! # impl portico::Responder for App {
//! #     async fn respond(&self, _request: portico::Request) -> portico::Response {
//! #         portico::Response::new(Vec::new())
//! #     }
//! # }
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let socket = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! let listener = BoundListener::from_tcp(socket, None);
//!
//! let server = Server::new(vec![listener], Arc::new(App), ServerOptions::default());
//! server.start().await?;
//! // ... serve until told otherwise ...
//! server.stop().await?;
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod time;

// Cross-cutting concerns
pub mod observability;

pub use config::ServerOptions;
pub use http::{
    DefaultErrorHandler, ErrorHandler, HttpDriver, HttpDriverFactory, Request, Responder, Response,
};
pub use lifecycle::{BoxError, LifecycleObserver, Server, ServerError, ServerState};
pub use net::{BoundListener, Client, ClientStream, ConnectionId, PeerKey, RemoteAddr, TlsContext};
pub use time::TimeReference;
