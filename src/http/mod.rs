//! HTTP collaborator interfaces.
//!
//! The lifecycle core consumes these; their implementations live outside
//! the crate (the protocol driver, the application responder) or ship as
//! replaceable defaults (the error handler).

pub mod driver;
pub mod error_handler;
pub mod responder;

pub use driver::{HttpDriver, HttpDriverFactory, NullDriverFactory};
pub use error_handler::{DefaultErrorHandler, ErrorHandler};
pub use responder::{Request, Responder, Response};
