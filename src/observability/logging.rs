//! Structured logging.
//!
//! The crate logs through `tracing` everywhere; this helper installs a
//! subscriber for embedders that do not bring their own.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize a fmt subscriber with an env-filter.
///
/// `RUST_LOG` wins when set; `default_filter` (for example
/// `"portico=debug"`) applies otherwise. Call once, early.
pub fn init_logging(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
