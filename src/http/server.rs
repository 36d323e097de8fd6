//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the proxy Router with the capture middleware stack
//! - Forward requests to their origin (absolute-form) or the configured upstream
//! - Serve the operator endpoints on their own listener
//! - Graceful shutdown of both listeners on one signal

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::{setup_admin_router, AdminState, CaptureStore};
use crate::capture::{capture_middleware, CaptureContextExt, Capturer};
use crate::config::AppConfig;
use crate::http::request::{assign_context, ContextPolicy};
use crate::lifecycle::Shutdown;
use crate::observability::access_log;

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Client<HttpConnector, Body>,
    pub upstream: Option<Authority>,
}

/// HTTP server for the capturing proxy.
pub struct HttpServer {
    router: Router,
    admin_router: Option<Router>,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig, capturer: Arc<Capturer>, store: Arc<CaptureStore>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        // Validation already rejected malformed authorities.
        let upstream = config
            .upstream
            .address
            .as_deref()
            .and_then(|addr| addr.parse::<Authority>().ok());

        let state = AppState { client, upstream };
        let router = Self::build_router(&config, state, capturer.clone());

        let admin_router = config.admin.enabled.then(|| {
            setup_admin_router(AdminState::new(capturer, store, config.admin.api_key.clone()))
        });

        Self {
            router,
            admin_router,
            config,
        }
    }

    /// Build the proxy router with all middleware layers.
    ///
    /// Layers run outermost first: trace, timeout, context assignment, capture.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState, capturer: Arc<Capturer>) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(middleware::from_fn_with_state(capturer, capture_middleware))
            .layer(middleware::from_fn_with_state(
                config.observability.access_log,
                access_log,
            ))
            .layer(middleware::from_fn_with_state(
                ContextPolicy::from_config(&config.capture),
                assign_context,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// The proxy router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The operator router, when enabled.
    pub fn admin_router(&self) -> Option<Router> {
        self.admin_router.clone()
    }

    /// Run the server until `shutdown` fires.
    ///
    /// The operator endpoints are served only when both the router is enabled
    /// and a listener is supplied.
    pub async fn run(
        self,
        listener: TcpListener,
        admin_listener: Option<TcpListener>,
        shutdown: &Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let proxy = axum::serve(
            listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(wait_for(shutdown.subscribe()));

        match (self.admin_router, admin_listener) {
            (Some(admin), Some(admin_listener)) => {
                tracing::info!(address = %admin_listener.local_addr()?, "Operator endpoints starting");
                let admin = axum::serve(admin_listener, admin.into_make_service())
                    .with_graceful_shutdown(wait_for(shutdown.subscribe()));
                tokio::try_join!(async { proxy.await }, async { admin.await })?;
            }
            _ => proxy.await?,
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

async fn wait_for(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
    tracing::info!("Shutdown signal received");
}

/// Forwards one request and relays the upstream response unchanged.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let context_id = request
        .capture_context()
        .map(|ctx| ctx.id().to_string())
        .unwrap_or_default();

    let (mut parts, body) = request.into_parts();

    let Some(authority) = parts.uri.authority().cloned().or_else(|| state.upstream.clone()) else {
        tracing::warn!(context_id = %context_id, uri = %parts.uri, "No upstream for request");
        return (StatusCode::BAD_GATEWAY, "No upstream configured").into_response();
    };

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::warn!(context_id = %context_id, error = %e, "Invalid forward URI");
            return (StatusCode::BAD_REQUEST, "Invalid request URI").into_response();
        }
    };
    // The upstream connection is plain HTTP/1.1 regardless of the client side.
    parts.version = Version::HTTP_11;

    tracing::debug!(
        context_id = %context_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(context_id = %context_id, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
