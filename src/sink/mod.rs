//! Publish pipeline and sinks.
//!
//! # Data Flow
//! ```text
//! serialized entry
//!     → pipeline.rs (one best-effort publish, outcome logged)
//!     → Publisher (print.rs: log only | channel.rs: in-process queue)
//!     → consumer (e.g. admin::archive)
//! ```
//!
//! # Design Decisions
//! - Exactly one publish attempt per entry; failures are logged and dropped
//! - The publisher interface mirrors an AMQP basic.publish: exchange,
//!   routing key, mandatory/immediate flags and a typed payload

pub mod channel;
pub mod pipeline;
pub mod print;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{SinkConfig, SinkKind};

pub use channel::{ChannelSink, Delivery};
pub use pipeline::{PublishOutcome, PublishPipeline, SinkRoute};
pub use print::PrintSink;

/// Content type of published entries.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A message handed to a publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publishing {
    pub content_type: String,
    pub body: Bytes,
}

impl Publishing {
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self {
            content_type: JSON_CONTENT_TYPE.to_string(),
            body: body.into(),
        }
    }
}

/// Errors a publisher can report.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("queue {0} is full")]
    QueueFull(String),

    #[error("queue {0} is closed")]
    Closed(String),

    /// Mandatory message with no queue bound to its routing key.
    #[error("no route for exchange {exchange:?} and routing key {routing_key:?}")]
    Unroutable {
        exchange: String,
        routing_key: String,
    },

    #[error("immediate delivery is not supported")]
    ImmediateUnsupported,
}

/// The message-sink collaborator.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one message. Returns once the sink accepted or refused it; no
    /// delivery acknowledgment is awaited.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        msg: Publishing,
    ) -> Result<(), SinkError>;
}

/// Build the configured publisher. The channel sink also returns its
/// consumer end; the queue is named after the routing key.
pub fn from_config(config: &SinkConfig) -> (Arc<dyn Publisher>, Option<mpsc::Receiver<Delivery>>) {
    match config.kind {
        SinkKind::Print => (Arc::new(PrintSink), None),
        SinkKind::Channel => {
            let (sink, rx) = ChannelSink::new(config.routing_key.clone(), config.queue_capacity);
            (Arc::new(sink), Some(rx))
        }
    }
}
