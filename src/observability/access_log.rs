//! Per-exchange access log.
//!
//! One line when a proxied request arrives and one when its response goes
//! back, both under `logger = "request"` so they can be filtered apart from
//! capture events. Unknown content lengths are logged as `-1`.

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::capture::CaptureContextExt;
use crate::config::AccessLogConfig;
use crate::har::convert::{absolute_url, content_length, target_host};
use crate::observability::logging::X_FORWARDED_FOR;

const LOGGER: &str = "request";

fn length_of(headers: &HeaderMap, body: &Body) -> i64 {
    content_length(headers)
        .or_else(|| body.size_hint().exact())
        .map_or(-1, |n| n as i64)
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// The line logged when a request arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLogLine {
    pub context_id: String,
    pub url: String,
    pub method: String,
    pub host: String,
    pub content_length: i64,
    pub user_agent: String,
    pub origin_ip: String,
}

impl RequestLogLine {
    pub fn from_request(req: &Request<Body>) -> Self {
        let headers = req.headers();
        Self {
            context_id: req
                .capture_context()
                .map(|ctx| ctx.id().to_string())
                .unwrap_or_default(),
            url: absolute_url(req.uri(), headers),
            method: req.method().to_string(),
            host: target_host(req.uri(), headers),
            content_length: length_of(headers, req.body()),
            user_agent: header_str(headers, header::USER_AGENT.as_str()),
            origin_ip: header_str(headers, X_FORWARDED_FOR),
        }
    }

    pub fn emit(&self) {
        tracing::info!(
            logger = LOGGER,
            context_id = %self.context_id,
            url = %self.url,
            method = %self.method,
            host = %self.host,
            content_length = self.content_length,
            user_agent = %self.user_agent,
            origin_ip = %self.origin_ip,
            "request received"
        );
    }
}

/// The line logged when the response goes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLogLine {
    pub context_id: String,
    pub url: String,
    pub status_code: u16,
    /// Code and reason phrase, e.g. `200 OK`.
    pub status: String,
    pub content_length: i64,
}

impl ResponseLogLine {
    pub fn from_response(url: String, res: &Response) -> Self {
        Self {
            context_id: res
                .capture_context()
                .map(|ctx| ctx.id().to_string())
                .unwrap_or_default(),
            url,
            status_code: res.status().as_u16(),
            status: res.status().to_string(),
            content_length: length_of(res.headers(), res.body()),
        }
    }

    pub fn emit(&self) {
        tracing::info!(
            logger = LOGGER,
            context_id = %self.context_id,
            url = %self.url,
            status_code = self.status_code,
            status = %self.status,
            content_length = self.content_length,
            "response"
        );
    }
}

/// Log both halves of each exchange that passes through.
pub async fn access_log(
    State(config): State<AccessLogConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let line = RequestLogLine::from_request(&request);
    if config.requests {
        line.emit();
    }

    let response = next.run(request).await;
    if config.responses {
        let mut out = ResponseLogLine::from_response(line.url, &response);
        if out.context_id.is_empty() {
            out.context_id = line.context_id;
        }
        out.emit();
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureContext;
    use axum::{http::StatusCode, middleware, routing::any, Router};
    use tower::ServiceExt;

    fn proxied_request() -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri("/search?q=1")
            .header("host", "api.example.com")
            .header("user-agent", "agent/2.0")
            .header("x-forwarded-for", "10.0.0.7")
            .header("content-length", "5")
            .body(Body::from("hello"))
            .unwrap();
        req.extensions_mut().insert(CaptureContext::new("ctx-9"));
        req
    }

    #[test]
    fn test_request_line_fields() {
        let line = RequestLogLine::from_request(&proxied_request());
        assert_eq!(line.context_id, "ctx-9");
        assert_eq!(line.url, "http://api.example.com/search?q=1");
        assert_eq!(line.method, "POST");
        assert_eq!(line.host, "api.example.com");
        assert_eq!(line.content_length, 5);
        assert_eq!(line.user_agent, "agent/2.0");
        assert_eq!(line.origin_ip, "10.0.0.7");
    }

    #[test]
    fn test_unknown_length_is_negative_one() {
        let body = Body::from_stream(futures_util::stream::iter(vec![Ok::<_, std::io::Error>(
            bytes::Bytes::from_static(b"x"),
        )]));
        let req = Request::builder().uri("http://a.example/").body(body).unwrap();
        let line = RequestLogLine::from_request(&req);
        assert_eq!(line.content_length, -1);
        assert_eq!(line.host, "a.example");
        assert!(line.context_id.is_empty());
    }

    #[test]
    fn test_response_line_fields() {
        let res = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("gone"))
            .unwrap();
        let line = ResponseLogLine::from_response("http://a.example/x".into(), &res);
        assert_eq!(line.status_code, 404);
        assert_eq!(line.status, "404 Not Found");
        assert_eq!(line.content_length, 4);
        assert_eq!(line.url, "http://a.example/x");
    }

    #[test]
    fn test_emit_does_not_panic() {
        RequestLogLine::from_request(&proxied_request()).emit();
        ResponseLogLine {
            context_id: "ctx-9".into(),
            url: "http://a.example/".into(),
            status_code: 200,
            status: "200 OK".into(),
            content_length: -1,
        }
        .emit();
    }

    #[tokio::test]
    async fn test_middleware_passes_exchange_through() {
        for config in [
            AccessLogConfig::default(),
            AccessLogConfig {
                requests: false,
                responses: false,
            },
        ] {
            let app = Router::new()
                .route("/{*path}", any(|body: String| async move { body }))
                .layer(middleware::from_fn_with_state(config, access_log));

            let res = app.oneshot(proxied_request()).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&body[..], b"hello");
        }
    }
}
