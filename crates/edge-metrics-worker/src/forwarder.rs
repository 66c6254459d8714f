use crate::reporter::MetricsReporter;
use edge_metrics::{MetricsQueue, QueuedBatch};
use std::sync::Arc;
use tracing::warn;

/// Drains `queue.listen()` and POSTs each environment's snapshot upstream. A
/// failed POST is logged and the batch dropped; it is never retried here.
pub async fn run_forwarder(
    queue: Arc<MetricsQueue>,
    reporter: Arc<dyn MetricsReporter>,
    cluster_id: String,
) {
    let mut receiver = queue.listen().await;
    while let Some(batch) = receiver.recv().await {
        let snapshot = match batch {
            QueuedBatch::Evaluation(snapshot) => snapshot,
            QueuedBatch::Target(snapshot) => snapshot,
        };
        for record in snapshot.values() {
            if record.metrics_data.is_empty() && record.target_data.is_empty() {
                continue;
            }
            if let Err(e) = reporter.post_metrics(record, &cluster_id).await {
                warn!(
                    environment = %record.environment_id,
                    error = %e,
                    "dropping metrics batch after failed upload"
                );
            }
        }
    }
}
