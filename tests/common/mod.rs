//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use har_capture::admin::{Archiver, CaptureStore};
use har_capture::capture::Capturer;
use har_capture::config::AppConfig;
use har_capture::http::HttpServer;
use har_capture::lifecycle::Shutdown;
use har_capture::observability::{CaptureEvents, MemoryEvents};
use har_capture::sink::{self, PublishPipeline, SinkRoute};

/// What the mock backend saw.
#[derive(Debug, Clone)]
pub struct Received {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

async fn echo(State(tx): State<mpsc::UnboundedSender<Received>>, request: Request<Body>) -> Bytes {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let _ = tx.send(Received {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body: body.clone(),
    });
    body
}

/// Start a backend that echoes request bodies and reports every request.
pub async fn start_echo_backend() -> (SocketAddr, mpsc::UnboundedReceiver<Received>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/{*path}", any(echo))
        .route("/", any(echo))
        .with_state(tx);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, rx)
}

/// A running proxy with its operator endpoints and archiver.
pub struct TestProxy {
    pub proxy_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub capturer: Arc<Capturer>,
    pub store: Arc<CaptureStore>,
    pub events: Arc<MemoryEvents>,
    pub shutdown: Arc<Shutdown>,
}

impl TestProxy {
    pub fn proxy_url(&self, path: &str) -> String {
        format!("http://{}{}", self.proxy_addr, path)
    }

    pub fn admin_url(&self, path: &str) -> String {
        format!("http://{}{}", self.admin_addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the proxy on ephemeral ports, forwarding origin-form requests to
/// `upstream` when given.
pub async fn start_proxy(upstream: Option<SocketAddr>) -> TestProxy {
    let mut config = AppConfig::default();
    config.upstream.address = upstream.map(|a| a.to_string());
    start_proxy_with(config).await
}

pub async fn start_proxy_with(config: AppConfig) -> TestProxy {
    let events = Arc::new(MemoryEvents::new());
    let dyn_events: Arc<dyn CaptureEvents> = events.clone();

    let (publisher, deliveries) = sink::from_config(&config.sink);
    let pipeline = PublishPipeline::new(publisher, SinkRoute::from(&config.sink), dyn_events.clone());
    let capturer = Arc::new(Capturer::new(&config.capture, pipeline, dyn_events));
    let store = Arc::new(CaptureStore::new(None));
    let shutdown = Arc::new(Shutdown::new());

    if let Some(rx) = deliveries {
        tokio::spawn(Archiver::new(store.clone(), rx).run(shutdown.subscribe()));
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = listener.local_addr().unwrap();
    let admin_addr = admin_listener.local_addr().unwrap();

    let server = HttpServer::new(config, capturer.clone(), store.clone());
    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = server
            .run(listener, Some(admin_listener), &server_shutdown)
            .await;
    });

    TestProxy {
        proxy_addr,
        admin_addr,
        capturer,
        store,
        events,
        shutdown,
    }
}

/// Poll `check` until it returns `Some` or two seconds pass.
pub async fn eventually<T, F>(mut check: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    for _ in 0..100 {
        if let Some(value) = check() {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}
