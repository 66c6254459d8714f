use crate::traits::FanOutBus;
use async_trait::async_trait;
use dashmap::DashMap;
use edge_core_types::errors::{ErrorClass, PublishError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// What a fan-out subscriber receives: either a data frame or an explicit signal
/// that the topic is being torn down.
#[derive(Debug, Clone)]
pub enum FanOutMessage {
    Data(Vec<u8>),
    Close,
}

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Proxy→SDK transient bus. Each topic backs exactly one SDK connection; there is no
/// durable replay, only whatever is currently subscribed.
pub struct InMemoryFanOutBus {
    topics: DashMap<String, broadcast::Sender<FanOutMessage>>,
    capacity: usize,
}

impl Default for InMemoryFanOutBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl InMemoryFanOutBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity,
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<FanOutMessage> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Local subscription used by whatever owns the actual per-client SSE response
    /// body; not part of the `FanOutBus` contract itself since that side is the
    /// HTTP transport's responsibility.
    pub fn subscribe_stream(&self, topic: &str) -> BroadcastStream<FanOutMessage> {
        BroadcastStream::new(self.sender_for(topic).subscribe())
    }
}

#[async_trait]
impl FanOutBus for InMemoryFanOutBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        let sender = self.sender_for(topic);
        // No subscribers is not a publish failure; the SDK may reconnect later.
        let _ = sender.send(FanOutMessage::Data(payload));
        Ok(())
    }

    async fn close(&self, topic: &str) -> Result<(), PublishError> {
        match self.topics.get(topic) {
            Some(sender) => {
                let _ = sender.send(FanOutMessage::Close);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl From<broadcast::error::SendError<FanOutMessage>> for PublishError {
    fn from(err: broadcast::error::SendError<FanOutMessage>) -> Self {
        PublishError {
            class: ErrorClass::UnexpectedError,
            message: err.to_string(),
        }
    }
}
