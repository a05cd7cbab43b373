//! Idle-deadline bookkeeping for active connections.
//!
//! # Design Decisions
//! - Deadlines are whole seconds from the shared coarse clock; tens of
//!   thousands of idle connections need no per-connection timers
//! - A secondary `BTreeMap` keyed by `(expiry, id)` keeps entries iterable
//!   in non-decreasing deadline order, so the per-tick sweep is O(k) in the
//!   number of expirations

use std::collections::{BTreeMap, HashMap};

use crate::net::client::ConnectionId;

/// Deadline map for connection idle timeouts.
///
/// Renewals always use `now + connection_timeout` with a non-decreasing
/// `now` and a constant timeout, so deadline order equals renewal order and
/// the expiry scan can stop at the first live entry.
#[derive(Debug, Default)]
pub struct TimeoutCache {
    by_id: HashMap<ConnectionId, u64>,
    by_expiry: BTreeMap<(u64, ConnectionId), ()>,
}

impl TimeoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or move `id` to the new deadline.
    pub fn renew(&mut self, id: ConnectionId, expires_at: u64) {
        if let Some(previous) = self.by_id.insert(id, expires_at) {
            self.by_expiry.remove(&(previous, id));
        }
        self.by_expiry.insert((expires_at, id), ());
    }

    /// Remove the entry for `id`; no-op if absent.
    pub fn clear(&mut self, id: ConnectionId) {
        if let Some(expires_at) = self.by_id.remove(&id) {
            self.by_expiry.remove(&(expires_at, id));
        }
    }

    /// Drain every entry whose deadline is at or before `now`.
    pub fn expired(&mut self, now: u64) -> Vec<ConnectionId> {
        let mut expired = Vec::new();
        while let Some((&(expires_at, id), ())) = self.by_expiry.first_key_value() {
            if now < expires_at {
                break;
            }
            self.by_expiry.remove(&(expires_at, id));
            self.by_id.remove(&id);
            expired.push(id);
        }
        expired
    }

    /// Entries in non-decreasing deadline order.
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionId, u64)> + '_ {
        self.by_expiry.keys().map(|&(expires_at, id)| (id, expires_at))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
