//! Lifecycle observer contract.

use async_trait::async_trait;
use std::sync::Arc;

use crate::lifecycle::error::BoxError;
use crate::lifecycle::supervisor::Server;

/// A subsystem that must initialize before traffic flows and tear down
/// before the server exits.
///
/// Hooks in each phase run concurrently across observers; no ordering
/// between observers is guaranteed. `on_start` failures abort startup and
/// trigger a full shutdown, during which every observer of the cycle
/// receives `on_stop`, including the one that failed. `on_stop` failures
/// are captured but never abort the shutdown.
#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// Called during startup, after the state machine enters starting and
    /// before any listener accepts.
    async fn on_start(&self, server: &Server) -> Result<(), BoxError>;

    /// Called during shutdown, after accept watchers are cancelled and
    /// before active connections are closed.
    async fn on_stop(&self, server: &Server) -> Result<(), BoxError>;
}

/// Append an observer unless the same instance is already present.
///
/// Membership is by pointer identity, not equality; attaching the same
/// `Arc` twice yields one set entry.
pub(crate) fn push_unique(
    set: &mut Vec<Arc<dyn LifecycleObserver>>,
    observer: Arc<dyn LifecycleObserver>,
) {
    if !set.iter().any(|existing| Arc::ptr_eq(existing, &observer)) {
        set.push(observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quiet;

    #[async_trait]
    impl LifecycleObserver for Quiet {
        async fn on_start(&self, _server: &Server) -> Result<(), BoxError> {
            Ok(())
        }

        async fn on_stop(&self, _server: &Server) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_push_unique_drops_same_instance() {
        let observer: Arc<dyn LifecycleObserver> = Arc::new(Quiet);
        let mut set = Vec::new();

        push_unique(&mut set, observer.clone());
        push_unique(&mut set, observer.clone());
        assert_eq!(set.len(), 1);

        push_unique(&mut set, Arc::new(Quiet));
        assert_eq!(set.len(), 2);
    }
}
