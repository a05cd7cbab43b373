//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! TOML file → loader.rs → schema.rs (ServerOptions) → validation.rs → Server
//! ```
//!
//! Embedders may also construct [`ServerOptions`] directly and skip the
//! loader entirely.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_options, ConfigError};
pub use schema::ServerOptions;
pub use validation::{validate_options, ValidationError};
