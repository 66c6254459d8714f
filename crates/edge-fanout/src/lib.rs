use edge_core_types::{EdgeError, EdgeResult, PublishError};
use edge_message_bus::FanOutBus;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Thin wrapper over the transient fan-out bus: marshals values to JSON and wraps
/// them in the SSE wire envelope SDK clients expect. `close` is a pass-through;
/// turning the resulting close directive into an actual connection teardown is the
/// HTTP transport layer's job.
pub struct FanOutPublisher {
    bus: Arc<dyn FanOutBus>,
}

impl FanOutPublisher {
    pub fn new(bus: Arc<dyn FanOutBus>) -> Self {
        Self { bus }
    }

    pub async fn publish<T: Serialize + ?Sized>(&self, topic: &str, value: &T) -> EdgeResult<()> {
        let payload = serde_json::to_vec(value)?;
        let envelope = sse_envelope(&payload);
        debug!(topic, bytes = envelope.len(), "publishing to SDK fan-out topic");
        self.bus
            .publish(topic, envelope)
            .await
            .map_err(from_publish_error)
    }

    pub async fn close(&self, topic: &str) -> EdgeResult<()> {
        debug!(topic, "closing SDK fan-out topic");
        self.bus.close(topic).await.map_err(from_publish_error)
    }
}

fn sse_envelope(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(payload.len() + 16);
    framed.extend_from_slice(b"event: *\ndata: ");
    framed.extend_from_slice(payload);
    framed.extend_from_slice(b"\n\n");
    framed
}

fn from_publish_error(err: PublishError) -> EdgeError {
    EdgeError::PublishError(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<(String, Vec<u8>)>>,
        closed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl FanOutBus for RecordingBus {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
            Ok(())
        }

        async fn close(&self, topic: &str) -> Result<(), PublishError> {
            self.closed.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_wraps_value_in_sse_envelope() {
        let bus = Arc::new(RecordingBus::default());
        let publisher = FanOutPublisher::new(bus.clone());

        publisher.publish("env-1", &serde_json::json!({"a": 1})).await.unwrap();

        let published = bus.published.lock().unwrap();
        let (topic, payload) = &published[0];
        assert_eq!(topic, "env-1");
        assert_eq!(payload, b"event: *\ndata: {\"a\":1}\n\n");
    }

    #[tokio::test]
    async fn close_passes_through_to_bus() {
        let bus = Arc::new(RecordingBus::default());
        let publisher = FanOutPublisher::new(bus.clone());

        publisher.close("env-1").await.unwrap();

        assert_eq!(bus.closed.lock().unwrap().as_slice(), ["env-1".to_string()]);
    }
}
