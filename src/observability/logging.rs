//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber from configuration
//! - Define the capture events the orchestrator and publish pipeline emit
//! - Provide the default tracing-backed event sink and an in-memory one
//!
//! # Design Decisions
//! - Capture code never calls a global logger directly; it is handed an
//!   `Arc<dyn CaptureEvents>` at construction
//! - Every event carries `context_id`, `origin_ip` and `host`
//! - JSON format for production, pretty format for development

use std::sync::{Mutex, PoisonError};

use axum::http::Request;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::observability::metrics;

/// Header carrying the client address as seen by upstream load balancers.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Fields attached to every capture log event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogContext {
    pub context_id: String,
    pub origin_ip: String,
    pub host: String,
}

impl LogContext {
    pub fn from_request<B>(context_id: &str, req: &Request<B>) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let host = match header("host") {
            h if h.is_empty() => req.uri().authority().map(|a| a.to_string()).unwrap_or_default(),
            h => h,
        };
        Self {
            context_id: context_id.to_string(),
            origin_ip: header(X_FORWARDED_FOR),
            host,
        }
    }
}

/// Something worth recording that happened while capturing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Entry handed to the sink.
    Enqueued(LogContext),
    /// Entry could not be serialized; nothing was published.
    SerializeFailed { ctx: LogContext, error: String },
    /// The sink refused the entry; it is dropped.
    PublishFailed { ctx: LogContext, error: String },
    /// Body materialization failed; nothing was recorded.
    CaptureFailed { ctx: LogContext, error: String },
    /// The request was excluded from capture.
    Skipped { context_id: String },
}

/// Receiver of capture events.
pub trait CaptureEvents: Send + Sync {
    fn record(&self, event: CaptureEvent);
}

/// Default event sink: tracing events plus metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEvents;

impl CaptureEvents for TracingEvents {
    fn record(&self, event: CaptureEvent) {
        match event {
            CaptureEvent::Enqueued(ctx) => {
                metrics::record_enqueued();
                tracing::info!(
                    context_id = %ctx.context_id,
                    origin_ip = %ctx.origin_ip,
                    host = %ctx.host,
                    "Enqueued request"
                );
            }
            CaptureEvent::SerializeFailed { ctx, error } => {
                metrics::record_serialize_failure();
                tracing::error!(
                    context_id = %ctx.context_id,
                    origin_ip = %ctx.origin_ip,
                    host = %ctx.host,
                    error = %error,
                    "Error serializing request"
                );
            }
            CaptureEvent::PublishFailed { ctx, error } => {
                metrics::record_publish_failure();
                tracing::error!(
                    context_id = %ctx.context_id,
                    origin_ip = %ctx.origin_ip,
                    host = %ctx.host,
                    error = %error,
                    "Error publishing request"
                );
            }
            CaptureEvent::CaptureFailed { ctx, error } => {
                metrics::record_capture_failure();
                tracing::warn!(
                    context_id = %ctx.context_id,
                    origin_ip = %ctx.origin_ip,
                    host = %ctx.host,
                    error = %error,
                    "Error capturing request"
                );
            }
            CaptureEvent::Skipped { context_id } => {
                metrics::record_skipped();
                tracing::debug!(context_id = %context_id, "Capture skipped");
            }
        }
    }
}

/// Keeps events in memory, for assertions.
#[derive(Debug, Default)]
pub struct MemoryEvents {
    events: Mutex<Vec<CaptureEvent>>,
}

impl MemoryEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CaptureEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CaptureEvents for MemoryEvents {
    fn record(&self, event: CaptureEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("har_capture={},tower_http=info", config.log_level)));

    let json = config.log_format == "json";
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}
