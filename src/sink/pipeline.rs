//! Best-effort delivery of serialized entries.

use std::sync::Arc;

use crate::config::SinkConfig;
use crate::har::CodecError;
use crate::observability::{CaptureEvent, CaptureEvents, LogContext};
use crate::sink::{Publisher, Publishing};

/// Where and how entries are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkRoute {
    pub exchange: String,
    pub routing_key: String,
    pub mandatory: bool,
    pub immediate: bool,
}

impl From<&SinkConfig> for SinkRoute {
    fn from(config: &SinkConfig) -> Self {
        Self {
            exchange: config.exchange.clone(),
            routing_key: config.routing_key.clone(),
            mandatory: config.mandatory,
            immediate: config.immediate,
        }
    }
}

/// What happened to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Enqueued,
    SerializeFailed,
    PublishFailed,
}

/// Hands serialized entries to a publisher, exactly once each.
#[derive(Clone)]
pub struct PublishPipeline {
    publisher: Arc<dyn Publisher>,
    route: SinkRoute,
    events: Arc<dyn CaptureEvents>,
}

impl PublishPipeline {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        route: SinkRoute,
        events: Arc<dyn CaptureEvents>,
    ) -> Self {
        Self {
            publisher,
            route,
            events,
        }
    }

    pub fn route(&self) -> &SinkRoute {
        &self.route
    }

    /// Publish the result of serializing one entry.
    ///
    /// Never fails: serialization and publish errors are recorded as events and
    /// the entry is dropped. There is no retry.
    pub async fn publish(
        &self,
        ctx: &LogContext,
        serialized: Result<Vec<u8>, CodecError>,
    ) -> PublishOutcome {
        let body = match serialized {
            Ok(body) => body,
            Err(e) => {
                self.events.record(CaptureEvent::SerializeFailed {
                    ctx: ctx.clone(),
                    error: e.to_string(),
                });
                return PublishOutcome::SerializeFailed;
            }
        };

        let result = self
            .publisher
            .publish(
                &self.route.exchange,
                &self.route.routing_key,
                self.route.mandatory,
                self.route.immediate,
                Publishing::json(body),
            )
            .await;

        match result {
            Ok(()) => {
                self.events.record(CaptureEvent::Enqueued(ctx.clone()));
                PublishOutcome::Enqueued
            }
            Err(e) => {
                self.events.record(CaptureEvent::PublishFailed {
                    ctx: ctx.clone(),
                    error: e.to_string(),
                });
                PublishOutcome::PublishFailed
            }
        }
    }
}
