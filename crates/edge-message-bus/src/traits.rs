use async_trait::async_trait;
use edge_core_types::{PublishError, SubscribeError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Invoked once per message a durable-bus subscription receives, in arrival order.
/// Returning an error only suppresses whatever the caller layers on top (e.g.
/// ChangeForwarder's republish); it never tears the subscription down.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, id: &str, payload: &[u8]) -> Result<(), edge_core_types::EdgeError>;
}

/// Append-only, per-topic durable stream shared between proxy instances. Message
/// order within one topic is preserved; there is no ordering guarantee across topics.
#[async_trait]
pub trait DurableBus: Send + Sync {
    /// Fire-and-forget publish with best-effort durability. Returns the backend's
    /// monotonically increasing message id.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, PublishError>;

    /// Invokes `handler` for every message on `topic` starting after `from_id`
    /// (`""` means tail: only new messages). Runs until `cancel` fires or the
    /// transport errors unrecoverably.
    async fn subscribe(
        &self,
        topic: &str,
        from_id: &str,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<(), SubscribeError>;
}

/// Transient, proxy→SDK fan-out topic. One topic backs exactly one SDK connection's
/// worth of subscribers. `subscribe` is local (no durable replay); `close` is the
/// explicit eviction hook LifecycleOrchestrator uses during recovery.
#[async_trait]
pub trait FanOutBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;

    /// Sends an explicit close directive to every current subscriber of `topic`.
    async fn close(&self, topic: &str) -> Result<(), PublishError>;
}
