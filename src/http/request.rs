//! Request correlation and capture exclusion.
//!
//! # Responsibilities
//! - Reuse or generate the correlation ID (`x-request-id`, UUID v4)
//! - Decide whether the request is excluded from capture
//! - Record the client address in `x-forwarded-for` when nobody upstream did
//! - Attach the resulting [`CaptureContext`] before the capture hook runs
//!
//! # Design Decisions
//! - Context is assigned as early as possible so every log line carries it
//! - The ID is echoed on the response for client-side correlation

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::capture::CaptureContext;
use crate::config::CaptureConfig;
use crate::observability::logging::X_FORWARDED_FOR;

pub const X_REQUEST_ID: &str = "x-request-id";

/// A request carrying `x-capture-skip: 1` is forwarded but not captured.
pub const X_CAPTURE_SKIP: &str = "x-capture-skip";

/// Decides which requests are captured.
#[derive(Debug, Clone, Default)]
pub struct ContextPolicy {
    skip_path_prefixes: Arc<[String]>,
}

impl ContextPolicy {
    pub fn new(skip_path_prefixes: Vec<String>) -> Self {
        Self {
            skip_path_prefixes: skip_path_prefixes.into(),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.skip_path_prefixes.clone())
    }

    /// Build the context for a request whose correlation ID is `id`.
    pub fn context_for<B>(&self, id: String, req: &Request<B>) -> CaptureContext {
        let path = req.uri().path();
        let skip_header = req
            .headers()
            .get(X_CAPTURE_SKIP)
            .is_some_and(|v| v.as_bytes() == b"1");
        let skip_path = self
            .skip_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()));

        if skip_header || skip_path {
            CaptureContext::skipping(id)
        } else {
            CaptureContext::new(id)
        }
    }
}

/// Middleware that attaches the capture context to every proxied request.
pub async fn assign_context(
    State(policy): State<ContextPolicy>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let existing = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let id = match existing {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            if let Ok(value) = HeaderValue::from_str(&id) {
                request.headers_mut().insert(X_REQUEST_ID, value);
            }
            id
        }
    };

    if !request.headers().contains_key(X_FORWARDED_FOR) {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        if let Some(ip) = peer {
            if let Ok(value) = HeaderValue::from_str(&ip.to_string()) {
                request.headers_mut().insert(X_FORWARDED_FOR, value);
            }
        }
    }

    let ctx = policy.context_for(id.clone(), &request);
    tracing::debug!(
        context_id = %id,
        skip = ctx.skipping_capture(),
        path = %request.uri().path(),
        "Capture context assigned"
    );
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureContextExt;
    use axum::{middleware, routing::any, Router};
    use tower::ServiceExt;

    fn request(path: &str) -> axum::http::request::Builder {
        Request::builder().uri(path)
    }

    #[test]
    fn test_skip_by_prefix_and_header() {
        let policy = ContextPolicy::new(vec!["/healthz".into()]);

        let req = request("/healthz/live").body(()).unwrap();
        assert!(policy.context_for("a".into(), &req).skipping_capture());

        let req = request("/api").header(X_CAPTURE_SKIP, "1").body(()).unwrap();
        assert!(policy.context_for("b".into(), &req).skipping_capture());

        let req = request("/api").header(X_CAPTURE_SKIP, "0").body(()).unwrap();
        let ctx = policy.context_for("c".into(), &req);
        assert!(!ctx.skipping_capture());
        assert_eq!(ctx.id(), "c");
    }

    async fn echo_context(request: Request<Body>) -> String {
        let ctx = request.capture_context().unwrap();
        let xff = request
            .headers()
            .get(X_FORWARDED_FOR)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        format!("{}|{}|{}", ctx.id(), ctx.skipping_capture(), xff)
    }

    fn app() -> Router {
        Router::new()
            .route("/{*path}", any(echo_context))
            .layer(middleware::from_fn_with_state(
                ContextPolicy::default(),
                assign_context,
            ))
    }

    #[tokio::test]
    async fn test_existing_request_id_is_kept() {
        let response = app()
            .oneshot(
                request("/orders")
                    .header(X_REQUEST_ID, "req-42")
                    .header(X_FORWARDED_FOR, "10.0.0.9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[X_REQUEST_ID], "req-42");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"req-42|false|10.0.0.9");
    }

    #[tokio::test]
    async fn test_request_id_generated_and_peer_recorded() {
        let mut req = request("/orders").body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 7], 5555))));

        let response = app().oneshot(req).await.unwrap();
        let id = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
        assert!(Uuid::parse_str(&id).is_ok());

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, format!("{id}|false|192.168.1.7"));
    }
}
