use async_trait::async_trait;
use edge_core_types::{ChangeEvent, EdgeError};

/// Receives each decoded change event in arrival order. An error here only
/// suppresses whatever the caller layers on top (e.g. ChangeForwarder's
/// republish); it never tears the SSE connection down.
#[async_trait]
pub trait ChangeEventHandler: Send + Sync {
    async fn handle(&self, event: ChangeEvent) -> Result<(), EdgeError>;
}
