//! Error-page rendering interface.

use async_trait::async_trait;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;

use crate::http::responder::{Request, Response};

/// Renders responses for protocol-level failures.
///
/// Called by the driver when a request cannot reach the responder, for
/// example on malformed input or an oversized payload.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Produce a response for the given failure.
    ///
    /// `request` is present when the failure occurred after a request line
    /// was parsed.
    async fn handle_error(
        &self,
        status: StatusCode,
        reason: Option<&str>,
        request: Option<&Request>,
    ) -> Response;
}

/// Built-in handler rendering a minimal HTML error page.
#[derive(Debug, Default)]
pub struct DefaultErrorHandler;

#[async_trait]
impl ErrorHandler for DefaultErrorHandler {
    async fn handle_error(
        &self,
        status: StatusCode,
        reason: Option<&str>,
        _request: Option<&Request>,
    ) -> Response {
        let reason = reason
            .or_else(|| status.canonical_reason())
            .unwrap_or("Unknown Error");
        let body = format!(
            "<html><head><title>{code} {reason}</title></head>\
             <body><h1>{code} {reason}</h1></body></html>",
            code = status.as_u16(),
            reason = reason,
        );

        let mut response = Response::new(body.into_bytes());
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        response
    }
}
