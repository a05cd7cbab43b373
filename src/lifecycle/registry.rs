//! Connection registry and admission control.
//!
//! # Responsibilities
//! - Track active connections and their per-peer distribution
//! - Enforce the global and per-peer connection caps at accept time
//! - Own the timeout cache and close idle connections on each clock tick
//! - Release all bookkeeping exactly once per connection
//!
//! # Design Decisions
//! - One mutex covers the client map, both counters, and the timeout
//!   cache, so the counting invariants hold at every lock release
//! - Admission increments first and compares the counter's previous value
//!   against the cap; a rejection undoes its own increments before the lock
//!   is released, so the net change is zero

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::config::ServerOptions;
use crate::net::client::ConnectionId;
use crate::net::peer::PeerKey;
use crate::observability::metrics;
use crate::time::reference::TimeReference;
use crate::time::timeouts::TimeoutCache;

struct ClientRecord {
    closer: Arc<Notify>,
}

#[derive(Default)]
struct RegistryState {
    clients: HashMap<ConnectionId, ClientRecord>,
    client_count: usize,
    per_peer: HashMap<PeerKey, usize>,
    timeouts: TimeoutCache,
}

/// Outcome of admission control for one accepted socket.
pub(crate) enum Admission {
    /// Connection registered; the guard releases its slot on drop.
    Admitted(ClientGuard),
    /// The global connection cap is reached.
    TooManyTotal,
    /// The peer's connection cap is reached and the peer is not exempt.
    TooManyForPeer,
}

/// Shared registry of active connections.
pub(crate) struct ClientRegistry {
    state: Mutex<RegistryState>,
    all_closed: Notify,
}

impl ClientRegistry {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            all_closed: Notify::new(),
        }
    }

    /// Run admission control and, on success, register the connection.
    pub(crate) fn try_register(
        self: &Arc<Self>,
        id: ConnectionId,
        peer: PeerKey,
        exempt_from_peer_cap: bool,
        closer: Arc<Notify>,
        expires_at: u64,
        options: &ServerOptions,
    ) -> Admission {
        let mut state = self.state.lock().expect("registry lock poisoned");

        let previous_total = state.client_count;
        state.client_count += 1;
        if previous_total == options.max_connections {
            state.client_count -= 1;
            return Admission::TooManyTotal;
        }

        let previous_for_peer = {
            let slot = state.per_peer.entry(peer.clone()).or_insert(0);
            let previous = *slot;
            *slot += 1;
            previous
        };
        if previous_for_peer == options.max_connections_per_peer && !exempt_from_peer_cap {
            release_peer(&mut state.per_peer, &peer);
            state.client_count -= 1;
            return Admission::TooManyForPeer;
        }

        state.clients.insert(id, ClientRecord { closer });
        state.timeouts.renew(id, expires_at);
        metrics::set_active_connections(state.client_count);

        Admission::Admitted(ClientGuard {
            registry: self.clone(),
            id,
            peer,
        })
    }

    /// Number of active connections.
    pub(crate) fn connection_count(&self) -> usize {
        self.state.lock().expect("registry lock poisoned").client_count
    }

    /// Signal every active connection to close.
    pub(crate) fn close_all(&self) -> usize {
        let state = self.state.lock().expect("registry lock poisoned");
        for record in state.clients.values() {
            record.closer.notify_one();
        }
        state.clients.len()
    }

    /// Close every connection whose idle deadline is at or before `now`.
    ///
    /// Runs synchronously on each clock publication; the deadline scan
    /// stops at the first live entry.
    pub(crate) fn close_expired(&self, now: u64) {
        let closers: Vec<Arc<Notify>> = {
            let mut state = self.state.lock().expect("registry lock poisoned");
            let expired = state.timeouts.expired(now);
            expired
                .iter()
                .filter_map(|id| state.clients.get(id).map(|record| record.closer.clone()))
                .collect()
        };
        if closers.is_empty() {
            return;
        }
        tracing::debug!(connections = closers.len(), now, "Closing idle connections");
        for closer in closers {
            closer.notify_one();
        }
    }

    /// Push a connection's idle deadline to `expires_at`.
    ///
    /// Ignored for connections that are no longer registered.
    pub(crate) fn renew_timeout(&self, id: ConnectionId, expires_at: u64) {
        let mut state = self.state.lock().expect("registry lock poisoned");
        if state.clients.contains_key(&id) {
            state.timeouts.renew(id, expires_at);
        }
    }

    /// Drop a connection from timeout tracking without closing it.
    pub(crate) fn clear_timeout(&self, id: ConnectionId) {
        self.state
            .lock()
            .expect("registry lock poisoned")
            .timeouts
            .clear(id);
    }

    /// Wait until no connections remain.
    pub(crate) async fn wait_all_closed(&self) {
        loop {
            if self.connection_count() == 0 {
                return;
            }
            let notified = self.all_closed.notified();
            if self.connection_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Registry size, global count, and per-peer sum, for invariant checks.
    #[cfg(test)]
    pub(crate) fn counts(&self) -> (usize, usize, usize) {
        let state = self.state.lock().expect("registry lock poisoned");
        (
            state.clients.len(),
            state.client_count,
            state.per_peer.values().sum(),
        )
    }

    #[cfg(test)]
    pub(crate) fn peer_count(&self, peer: &PeerKey) -> usize {
        self.state
            .lock()
            .expect("registry lock poisoned")
            .per_peer
            .get(peer)
            .copied()
            .unwrap_or(0)
    }
}

fn release_peer(per_peer: &mut HashMap<PeerKey, usize>, peer: &PeerKey) {
    if let Some(slot) = per_peer.get_mut(peer) {
        *slot -= 1;
        if *slot == 0 {
            per_peer.remove(peer);
        }
    }
}

/// Releases a registered connection's bookkeeping when dropped.
///
/// Held inside the [`Client`](crate::net::client::Client) behind its
/// stream, so the socket is already released when this runs. Dropping is
/// the close callback: it fires exactly once, whether the driver finished,
/// the sweep evicted the connection, or shutdown closed it.
pub(crate) struct ClientGuard {
    registry: Arc<ClientRegistry>,
    id: ConnectionId,
    peer: PeerKey,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        {
            let mut state = self.registry.state.lock().expect("registry lock poisoned");
            state.clients.remove(&self.id);
            state.timeouts.clear(self.id);
            state.client_count = state.client_count.saturating_sub(1);
            release_peer(&mut state.per_peer, &self.peer);
            metrics::set_active_connections(state.client_count);
        }
        // notify_one stores a permit when nobody is waiting yet, so the
        // final close cannot slip past the shutdown drain.
        self.registry.all_closed.notify_one();
    }
}

/// Per-connection handle for deadline renewal, held by the client.
pub(crate) struct TimeoutHandle {
    registry: Arc<ClientRegistry>,
    time: TimeReference,
    id: ConnectionId,
    timeout_secs: u64,
}

impl TimeoutHandle {
    pub(crate) fn new(
        registry: Arc<ClientRegistry>,
        time: TimeReference,
        id: ConnectionId,
        timeout_secs: u64,
    ) -> Self {
        Self {
            registry,
            time,
            id,
            timeout_secs,
        }
    }

    pub(crate) fn renew(&self) {
        self.registry
            .renew_timeout(self.id, self.time.now() + self.timeout_secs);
    }

    pub(crate) fn clear(&self) {
        self.registry.clear_timeout(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ConnectionId {
        ConnectionId(n)
    }

    fn peer(last: u8) -> PeerKey {
        PeerKey::from_ip(std::net::IpAddr::V4(std::net::Ipv4Addr::new(
            10, 0, 0, last,
        )))
    }

    fn options(max: usize, per_peer: usize) -> ServerOptions {
        ServerOptions {
            max_connections: max,
            max_connections_per_peer: per_peer,
            ..ServerOptions::default()
        }
    }

    fn register(
        registry: &Arc<ClientRegistry>,
        n: u64,
        key: PeerKey,
        exempt: bool,
        opts: &ServerOptions,
    ) -> Admission {
        registry.try_register(id(n), key, exempt, Arc::new(Notify::new()), 60, opts)
    }

    #[test]
    fn test_global_cap_rejects_at_previous_equals_max() {
        let registry = Arc::new(ClientRegistry::new());
        let opts = options(2, 10);

        let g1 = register(&registry, 1, peer(1), false, &opts);
        let g2 = register(&registry, 2, peer(2), false, &opts);
        assert!(matches!(g1, Admission::Admitted(_)));
        assert!(matches!(g2, Admission::Admitted(_)));

        let g3 = register(&registry, 3, peer(3), false, &opts);
        assert!(matches!(g3, Admission::TooManyTotal));
        assert_eq!(registry.counts(), (2, 2, 2));
    }

    #[test]
    fn test_peer_cap_rejects_nonexempt_peer() {
        let registry = Arc::new(ClientRegistry::new());
        let opts = options(10, 1);

        let g1 = register(&registry, 1, peer(1), false, &opts);
        assert!(matches!(g1, Admission::Admitted(_)));

        let g2 = register(&registry, 2, peer(1), false, &opts);
        assert!(matches!(g2, Admission::TooManyForPeer));

        // The rejection left every counter where it was.
        assert_eq!(registry.counts(), (1, 1, 1));
        assert_eq!(registry.peer_count(&peer(1)), 1);

        // A different peer still gets in.
        let g3 = register(&registry, 3, peer(2), false, &opts);
        assert!(matches!(g3, Admission::Admitted(_)));
    }

    #[test]
    fn test_exempt_peer_ignores_peer_cap_but_not_global() {
        let registry = Arc::new(ClientRegistry::new());
        let opts = options(3, 1);
        let loopback = PeerKey::from_ip("127.0.0.1".parse().unwrap());

        let mut guards = Vec::new();
        for n in 1..=3 {
            match register(&registry, n, loopback.clone(), true, &opts) {
                Admission::Admitted(guard) => guards.push(guard),
                _ => panic!("exempt peer should be admitted"),
            }
        }
        assert_eq!(registry.peer_count(&loopback), 3);

        // Global cap still applies to exempt peers.
        let overflow = register(&registry, 4, loopback.clone(), true, &opts);
        assert!(matches!(overflow, Admission::TooManyTotal));
    }

    #[test]
    fn test_guard_drop_releases_all_counters() {
        let registry = Arc::new(ClientRegistry::new());
        let opts = options(1, 1);

        let admitted = register(&registry, 1, peer(1), false, &opts);
        assert!(matches!(admitted, Admission::Admitted(_)));
        assert_eq!(registry.counts(), (1, 1, 1));

        drop(admitted);
        assert_eq!(registry.counts(), (0, 0, 0));
        assert_eq!(registry.peer_count(&peer(1)), 0);

        // Capacity is back.
        let again = register(&registry, 2, peer(1), false, &opts);
        assert!(matches!(again, Admission::Admitted(_)));
    }

    #[test]
    fn test_renew_ignored_after_close() {
        let registry = Arc::new(ClientRegistry::new());
        let opts = options(5, 5);

        let admitted = register(&registry, 1, peer(1), false, &opts);
        drop(admitted);

        registry.renew_timeout(id(1), 120);
        let state = registry.state.lock().unwrap();
        assert!(state.timeouts.is_empty());
    }

    #[tokio::test]
    async fn test_close_all_signals_every_closer() {
        let registry = Arc::new(ClientRegistry::new());
        let opts = options(5, 5);

        let closer_a = Arc::new(Notify::new());
        let closer_b = Arc::new(Notify::new());
        let _a = registry.try_register(id(1), peer(1), false, closer_a.clone(), 60, &opts);
        let _b = registry.try_register(id(2), peer(2), false, closer_b.clone(), 60, &opts);

        assert_eq!(registry.close_all(), 2);
        closer_a.notified().await;
        closer_b.notified().await;
    }

    #[tokio::test]
    async fn test_close_expired_signals_only_overdue() {
        let registry = Arc::new(ClientRegistry::new());
        let opts = options(5, 5);

        let overdue = Arc::new(Notify::new());
        let fresh = Arc::new(Notify::new());
        let _a = registry.try_register(id(1), peer(1), false, overdue.clone(), 5, &opts);
        let _b = registry.try_register(id(2), peer(2), false, fresh.clone(), 9, &opts);

        registry.close_expired(5);
        overdue.notified().await;

        // The fresh connection was not signalled; its permit is absent.
        let undisturbed =
            tokio::time::timeout(std::time::Duration::from_millis(20), fresh.notified()).await;
        assert!(undisturbed.is_err());
    }

    #[tokio::test]
    async fn test_wait_all_closed_returns_once_empty() {
        let registry = Arc::new(ClientRegistry::new());
        let opts = options(5, 5);

        let admitted = register(&registry, 1, peer(1), false, &opts);
        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.wait_all_closed().await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(admitted);
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait_all_closed should resolve")
            .unwrap();
    }
}
