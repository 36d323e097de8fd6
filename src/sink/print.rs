//! Log-only sink.

use async_trait::async_trait;

use crate::sink::{Publisher, Publishing, SinkError};

/// Writes every message to the log instead of a broker.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintSink;

#[async_trait]
impl Publisher for PrintSink {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        _mandatory: bool,
        _immediate: bool,
        msg: Publishing,
    ) -> Result<(), SinkError> {
        tracing::info!(
            exchange = %exchange,
            routing_key = %routing_key,
            content_type = %msg.content_type,
            payload = %String::from_utf8_lossy(&msg.body),
            "Published message"
        );
        Ok(())
    }
}
