//! Coarse monotonic clock shared by connection bookkeeping.
//!
//! # Responsibilities
//! - Publish a whole-second "now" roughly once per second while the server
//!   is started
//! - Run subscriber callbacks synchronously, in registration order
//!
//! # Design Decisions
//! - One shared clock replaces per-connection timer registration; the only
//!   question idle connections need answered is "have I been silent too
//!   long", and second granularity is plenty for that

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::lifecycle::error::BoxError;
use crate::lifecycle::observer::LifecycleObserver;
use crate::lifecycle::supervisor::Server;

type Subscriber = Box<dyn Fn(u64) + Send + Sync>;

struct TimeShared {
    epoch: Instant,
    now: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl TimeShared {
    fn publish(&self, now: u64) {
        let previous = self.now.fetch_max(now, Ordering::AcqRel);
        if now < previous {
            return;
        }
        let subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        for subscriber in subscribers.iter() {
            subscriber(now);
        }
    }
}

/// Publisher of coarse monotonic seconds.
///
/// The reference is itself a lifecycle observer: `on_start` spawns the
/// ticker task, `on_stop` aborts it. Between cycles the clock value is
/// retained, so `now` never decreases across restarts.
#[derive(Clone)]
pub struct TimeReference {
    shared: Arc<TimeShared>,
}

impl TimeReference {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(TimeShared {
                epoch: Instant::now(),
                now: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
                ticker: Mutex::new(None),
            }),
        }
    }

    /// The most recently published second.
    pub fn now(&self) -> u64 {
        self.shared.now.load(Ordering::Acquire)
    }

    /// Register a callback invoked on every publication.
    ///
    /// Callbacks run synchronously on the ticker task; keep them short.
    pub fn subscribe(&self, subscriber: impl Fn(u64) + Send + Sync + 'static) {
        self.shared
            .subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .push(Box::new(subscriber));
    }

    /// Publish a clock value directly.
    ///
    /// The ticker does this once per second while the server runs; tests
    /// and embedders with their own clock source may call it as well.
    /// Values below the current `now` are ignored.
    pub fn publish(&self, now: u64) {
        self.shared.publish(now);
    }
}

impl Default for TimeReference {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleObserver for TimeReference {
    async fn on_start(&self, _server: &Server) -> Result<(), BoxError> {
        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                ticker.tick().await;
                shared.publish(shared.epoch.elapsed().as_secs());
            }
        });
        let previous = self
            .shared
            .ticker
            .lock()
            .expect("ticker lock poisoned")
            .replace(handle);
        if let Some(stale) = previous {
            stale.abort();
        }
        tracing::debug!("Time reference ticking");
        Ok(())
    }

    async fn on_stop(&self, _server: &Server) -> Result<(), BoxError> {
        if let Some(handle) = self
            .shared
            .ticker
            .lock()
            .expect("ticker lock poisoned")
            .take()
        {
            handle.abort();
        }
        tracing::debug!("Time reference stopped");
        Ok(())
    }
}

impl std::fmt::Debug for TimeReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeReference")
            .field("now", &self.now())
            .finish_non_exhaustive()
    }
}
