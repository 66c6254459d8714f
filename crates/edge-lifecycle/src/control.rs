use async_trait::async_trait;
use edge_core_types::{ChangeEventKind, EdgeError};
use edge_sse_ingestor::ConnectionObserver;
use std::sync::Arc;
use tracing::warn;

/// Adapts the `stream_action` bus topic into the same `ConnectionObserver` contract
/// `SseIngestor` drives the Primary with, so a Replica's lifecycle reacts to the
/// Primary's broadcast connect/disconnect events identically to how the Primary
/// reacts to its own SSE connection.
pub struct ReplicaControlHandler {
    observer: Arc<dyn ConnectionObserver>,
}

impl ReplicaControlHandler {
    pub fn new(observer: Arc<dyn ConnectionObserver>) -> Self {
        Self { observer }
    }
}

#[async_trait]
impl edge_message_bus::MessageHandler for ReplicaControlHandler {
    async fn handle(&self, _id: &str, payload: &[u8]) -> Result<(), EdgeError> {
        let event: edge_core_types::ChangeEvent = serde_json::from_slice(payload)?;
        match event.event {
            ChangeEventKind::StreamAction if event.domain == edge_core_types::ChangeDomain::Disconnect => {
                self.observer.on_disconnect().await;
            }
            ChangeEventKind::StreamAction if event.domain == edge_core_types::ChangeDomain::Connect => {
                self.observer.on_connect().await;
            }
            _ => {
                warn!("ignoring unexpected message on the stream_action control topic");
            }
        }
        Ok(())
    }
}
