//! Observability subsystem.
//!
//! # Responsibilities
//! - Initialize structured logging (tracing)
//! - Export connection metrics via Prometheus

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
