//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (supervisor.rs):
//!     stopped → starting → observer fan-out → started → ALPN → accept loops
//!
//! Admission (accept.rs + registry.rs):
//!     accept → global cap → per-peer cap (loopback/Unix exempt) → driver task
//!
//! Shutdown (supervisor.rs):
//!     stopping → cancel watchers → observer fan-out → close clients → stopped
//! ```
//!
//! # Design Decisions
//! - Observer startup is all-or-nothing: one failure rolls the whole
//!   server back through the shutdown sequence
//! - Shutdown is deadline-bounded for the caller but always runs to
//!   completion; the state machine never wedges in stopping

pub(crate) mod accept;
pub mod error;
pub mod observer;
pub(crate) mod registry;
pub mod state;
pub mod supervisor;

pub use error::{BoxError, ServerError};
pub use observer::LifecycleObserver;
pub use state::ServerState;
pub use supervisor::Server;
