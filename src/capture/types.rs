//! Capture policy and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What gets recorded for each exchange.
///
/// Both toggles default to `true`: post data and response bodies are captured
/// unless turned off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturePolicy {
    /// Record response bodies.
    pub body_logging: bool,
    /// Record request post data. When off, only the MIME type is kept.
    pub post_data_logging: bool,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            body_logging: true,
            post_data_logging: true,
        }
    }
}

/// Errors that abort a single capture attempt.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Reading the request body failed. The body is gone at this point.
    #[error("failed to snapshot request body: {0}")]
    Snapshot(#[source] axum::Error),

    /// `multipart/form-data` without a `boundary` parameter.
    #[error("multipart body has no boundary")]
    MissingBoundary,

    /// Part iteration or part read failed.
    #[error("failed to decode multipart body: {0}")]
    Multipart(#[from] multer::Error),

    /// `application/x-www-form-urlencoded` pair with a malformed escape.
    #[error("malformed URL-encoded pair {0:?}")]
    Form(String),
}

impl CaptureError {
    /// True when the request can no longer be forwarded as received.
    pub fn body_lost(&self) -> bool {
        matches!(self, CaptureError::Snapshot(_))
    }
}
