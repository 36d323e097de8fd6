//! Capture orchestration.
//!
//! # Responsibilities
//! - Resolve the correlation ID and exclusion flag for each hook call
//! - Build the HAR entry for a request, body included per policy
//! - Track entries in the registry and hand them to the publish pipeline
//!
//! # Design Decisions
//! - The registry lock covers the map update only; body reads, serialization
//!   and publishing run outside it, on the caller's task
//! - The policy can be swapped at runtime without locking
//! - Capture never fails the proxied exchange except when the body read itself
//!   failed (the body is gone)

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{Request, Response};

use crate::capture::body::{self, declared_length};
use crate::capture::context::CaptureContextExt;
use crate::capture::registry::EntryRegistry;
use crate::capture::types::{CaptureError, CapturePolicy};
use crate::config::CaptureConfig;
use crate::har::{self, convert::target_host, Entry, UNKNOWN_SIZE};
use crate::observability::{CaptureEvent, CaptureEvents, LogContext};
use crate::sink::{PublishOutcome, PublishPipeline};

/// Records proxied traffic as HAR entries.
pub struct Capturer {
    policy: ArcSwap<CapturePolicy>,
    body_limit: usize,
    registry: EntryRegistry,
    pipeline: PublishPipeline,
    events: Arc<dyn CaptureEvents>,
}

impl Capturer {
    pub fn new(
        config: &CaptureConfig,
        pipeline: PublishPipeline,
        events: Arc<dyn CaptureEvents>,
    ) -> Self {
        Self {
            policy: ArcSwap::from_pointee(config.policy()),
            body_limit: config.max_body_bytes,
            registry: EntryRegistry::new(),
            pipeline,
            events,
        }
    }

    /// Current capture policy.
    pub fn policy(&self) -> CapturePolicy {
        **self.policy.load()
    }

    /// Replace the capture policy for subsequent requests.
    pub fn set_policy(&self, policy: CapturePolicy) {
        tracing::info!(
            body_logging = policy.body_logging,
            post_data_logging = policy.post_data_logging,
            "Capture policy updated"
        );
        self.policy.store(Arc::new(policy));
    }

    pub fn registry(&self) -> &EntryRegistry {
        &self.registry
    }

    /// Request hook.
    ///
    /// A request without a [`CaptureContext`](crate::capture::CaptureContext)
    /// is treated as excluded.
    pub async fn modify_request(&self, req: &mut Request<Body>) -> Result<(), CaptureError> {
        let Some(ctx) = req.capture_context().cloned() else {
            return Ok(());
        };
        if ctx.skipping_capture() {
            self.events.record(CaptureEvent::Skipped {
                context_id: ctx.id().to_string(),
            });
            return Ok(());
        }
        self.record_request(ctx.id(), req).await.map(|_| ())
    }

    /// Record `req` under `id` and publish it.
    ///
    /// `id` must be unique per request/response pair. On error nothing is
    /// tracked or published.
    pub async fn record_request(
        &self,
        id: &str,
        req: &mut Request<Body>,
    ) -> Result<PublishOutcome, CaptureError> {
        let log_ctx = LogContext::from_request(id, req);
        let policy = self.policy();

        let mut request = har::Request::from_http(req.method(), req.uri(), req.version(), req.headers());
        request.body_size = declared_length(req).map_or(UNKNOWN_SIZE, |n| n as i64);
        request.post_data = match body::post_data(req, policy.post_data_logging, self.body_limit).await {
            Ok(pd) => pd,
            Err(e) => {
                self.events.record(CaptureEvent::CaptureFailed {
                    ctx: log_ctx,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let entry = Entry::new(id, target_host(req.uri(), req.headers()), request);
        self.registry.insert(entry.clone());

        let serialized = har::serialize_entry(&entry);
        Ok(self.pipeline.publish(&log_ctx, serialized).await)
    }

    /// Response hook. Same context rules as [`Capturer::modify_request`].
    pub async fn modify_response(&self, res: &mut Response<Body>) -> Result<(), CaptureError> {
        let Some(ctx) = res.capture_context().cloned() else {
            return Ok(());
        };
        if ctx.skipping_capture() {
            return Ok(());
        }
        self.record_response(ctx.id(), res).await
    }

    /// Associate a response with the entry recorded under `id`.
    ///
    /// Responses are not recorded: entries are published at request time and
    /// never carry a `response`.
    pub async fn record_response(&self, _id: &str, _res: &mut Response<Body>) -> Result<(), CaptureError> {
        // TODO: build har::Response (with Content when body_logging is on) and
        // publish it once response capture is confirmed as wanted.
        Ok(())
    }
}
