use async_trait::async_trait;

/// Opaque lifecycle hooks the ingestor invokes around each connection attempt.
/// `SseIngestor` never knows about the concrete orchestrator behind this trait,
/// which is what lets the orchestrator be built on top of the ingestor instead of
/// the two types needing to know about each other up front.
#[async_trait]
pub trait ConnectionObserver: Send + Sync {
    async fn on_connect(&self);
    async fn on_disconnect(&self);
}

/// Observer that does nothing; useful for Replica wiring or tests that don't care
/// about lifecycle side effects.
pub struct NoopObserver;

#[async_trait]
impl ConnectionObserver for NoopObserver {
    async fn on_connect(&self) {}
    async fn on_disconnect(&self) {}
}
