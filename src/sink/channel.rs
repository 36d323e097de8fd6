//! In-process queue sink.
//!
//! # Design Decisions
//! - Bounded tokio mpsc channel; a full queue is a publish failure, never a
//!   wait
//! - Routing follows the AMQP default exchange: the routing key must name the
//!   queue; unroutable messages are dropped unless `mandatory` is set

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::sink::{Publisher, Publishing, SinkError};

/// A message as received by the queue consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub exchange: String,
    pub routing_key: String,
    pub publishing: Publishing,
}

/// Publisher backed by a bounded in-process queue.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    queue: String,
    tx: mpsc::Sender<Delivery>,
}

impl ChannelSink {
    /// Create the queue named `queue` and return its consumer end.
    pub fn new(queue: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                queue: queue.into(),
                tx,
            },
            rx,
        )
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

#[async_trait]
impl Publisher for ChannelSink {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        mandatory: bool,
        immediate: bool,
        msg: Publishing,
    ) -> Result<(), SinkError> {
        if immediate {
            return Err(SinkError::ImmediateUnsupported);
        }

        if !exchange.is_empty() || routing_key != self.queue {
            if mandatory {
                return Err(SinkError::Unroutable {
                    exchange: exchange.to_string(),
                    routing_key: routing_key.to_string(),
                });
            }
            tracing::debug!(exchange = %exchange, routing_key = %routing_key, "Dropping unroutable message");
            return Ok(());
        }

        let delivery = Delivery {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            publishing: msg,
        };
        self.tx.try_send(delivery).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::QueueFull(self.queue.clone()),
            TrySendError::Closed(_) => SinkError::Closed(self.queue.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delivers_to_named_queue() {
        let (sink, mut rx) = ChannelSink::new("har", 4);
        sink.publish("", "har", false, false, Publishing::json("{\"a\":1}"))
            .await
            .unwrap();

        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.routing_key, "har");
        assert_eq!(delivery.publishing.content_type, "application/json");
        assert_eq!(delivery.publishing.body.as_ref(), b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_unroutable_messages() {
        let (sink, mut rx) = ChannelSink::new("har", 4);

        sink.publish("", "other", false, false, Publishing::json("{}"))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());

        let err = sink
            .publish("", "other", true, false, Publishing::json("{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Unroutable { .. }));

        let err = sink
            .publish("", "har", false, true, Publishing::json("{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::ImmediateUnsupported));
    }

    #[tokio::test]
    async fn test_full_and_closed_queue() {
        let (sink, rx) = ChannelSink::new("har", 1);
        sink.publish("", "har", false, false, Publishing::json("1")).await.unwrap();
        let err = sink.publish("", "har", false, false, Publishing::json("2")).await.unwrap_err();
        assert!(matches!(err, SinkError::QueueFull(_)));

        drop(rx);
        let err = sink.publish("", "har", false, false, Publishing::json("3")).await.unwrap_err();
        assert!(matches!(err, SinkError::Closed(_)));
    }
}
