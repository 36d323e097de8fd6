//! Interception hooks wired into the proxy's middleware stack.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::capture::capturer::Capturer;
use crate::capture::context::CaptureContextExt;

/// Runs the request hook before forwarding and the response hook after.
///
/// Capture errors are already recorded by the capturer and do not affect the
/// exchange, except a failed body read: that request is answered with 400.
pub async fn capture_middleware(
    State(capturer): State<Arc<Capturer>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Err(e) = capturer.modify_request(&mut request).await {
        if e.body_lost() {
            return (StatusCode::BAD_REQUEST, "Request body could not be read").into_response();
        }
    }

    let ctx = request.capture_context().cloned();
    let mut response = next.run(request).await;
    if let Some(ctx) = ctx {
        response.extensions_mut().insert(ctx);
    }

    if let Err(e) = capturer.modify_response(&mut response).await {
        tracing::warn!(error = %e, "Response capture failed");
    }
    response
}
