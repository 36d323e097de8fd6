//! Per-request capture context.
//!
//! The proxy attaches a [`CaptureContext`] to every request it intercepts. The
//! capture hooks read it back to learn the correlation ID and whether the
//! request is excluded from capture.

use axum::http::{Request, Response};

/// Correlation ID plus the exclusion flag for one request/response cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureContext {
    id: String,
    skip: bool,
}

impl CaptureContext {
    /// Context for a request that should be captured.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            skip: false,
        }
    }

    /// Context for a request that must not be captured.
    pub fn skipping(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            skip: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn skipping_capture(&self) -> bool {
        self.skip
    }
}

/// Access to the capture context stored in message extensions.
pub trait CaptureContextExt {
    fn capture_context(&self) -> Option<&CaptureContext>;
}

impl<B> CaptureContextExt for Request<B> {
    fn capture_context(&self) -> Option<&CaptureContext> {
        self.extensions().get::<CaptureContext>()
    }
}

impl<B> CaptureContextExt for Response<B> {
    fn capture_context(&self) -> Option<&CaptureContext> {
        self.extensions().get::<CaptureContext>()
    }
}
