use async_trait::async_trait;
use edge_core_types::EdgeResult;

/// The Primary's hook back into the SaaS backend: pulling the latest config after
/// reconnecting, or polling it once while disconnected from the stream. Both calls
/// are best-effort; a failure is logged by the caller and never retried here.
#[async_trait]
pub trait SaasPoller: Send + Sync {
    async fn poll(&self) -> EdgeResult<()>;
    async fn reload_config(&self) -> EdgeResult<()>;
}
