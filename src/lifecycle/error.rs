//! Error definitions for the server lifecycle.

use thiserror::Error;

use crate::lifecycle::state::ServerState;

/// Boxed error carried out of observer hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by supervisor operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The operation is only valid in a specific lifecycle state.
    #[error("{operation} requires a {expected} server, but the server is {actual}")]
    InvalidState {
        operation: &'static str,
        expected: ServerState,
        actual: ServerState,
    },

    /// An observer's startup hook failed; the server was shut back down.
    #[error("server startup failed")]
    Startup(#[source] BoxError),

    /// An observer's shutdown hook failed; shutdown still ran to completion.
    #[error("server shutdown reported an observer failure")]
    Shutdown(#[source] BoxError),

    /// Shutdown did not finish within the configured deadline. It keeps
    /// running in the background; the state machine will reach stopped.
    #[error("shutdown did not complete within {timeout_secs} seconds")]
    ShutdownTimedOut { timeout_secs: u64 },
}
