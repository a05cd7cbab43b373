//! Server lifecycle states.
//!
//! # State Machine
//! ```text
//! Stopped → Starting → Started → Stopping → Stopped
//! ```
//!
//! Transitions are strictly forward within a cycle; there are no
//! back-edges. A failed startup still travels through stopping before it
//! returns to stopped.

/// Lifecycle state of the server supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, or fully shut down. The only state accepting
    /// configuration changes.
    Stopped,
    /// Observer startup in flight; no connections accepted yet.
    Starting,
    /// Accepting and serving connections.
    Started,
    /// Shutdown in flight; accept watchers are gone, connections draining.
    Stopping,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerState::Stopped => write!(f, "stopped"),
            ServerState::Starting => write!(f, "starting"),
            ServerState::Started => write!(f, "started"),
            ServerState::Stopping => write!(f, "stopping"),
        }
    }
}
