pub mod forwarder;
pub mod reporter;
pub mod subscriber;

pub use reporter::{MetricsReporter, ReqwestMetricsReporter};

use edge_message_bus::DurableBus;
use edge_metrics::MetricsQueue;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONSUMER_CONCURRENCY: usize = 4;

/// Runs on the Primary only: one bus subscriber on `sdk_metrics` fanning decoded
/// records out to parallel consumers, and one forwarder posting flushed batches
/// upstream. Construction just spawns both tasks; drop the returned handles or
/// cancel the shared token to stop them.
pub struct MetricsWorker {
    subscriber: JoinHandle<()>,
    forwarder: JoinHandle<()>,
}

impl MetricsWorker {
    pub fn spawn(
        bus: Arc<dyn DurableBus>,
        queue: Arc<MetricsQueue>,
        reporter: Arc<dyn MetricsReporter>,
        cluster_id: String,
        cancel: CancellationToken,
    ) -> Self {
        Self::spawn_with_concurrency(
            bus,
            queue,
            reporter,
            cluster_id,
            DEFAULT_CONSUMER_CONCURRENCY,
            cancel,
        )
    }

    pub fn spawn_with_concurrency(
        bus: Arc<dyn DurableBus>,
        queue: Arc<MetricsQueue>,
        reporter: Arc<dyn MetricsReporter>,
        cluster_id: String,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Self {
        let subscriber = tokio::spawn(subscriber::run_subscriber(
            bus,
            queue.clone(),
            concurrency,
            cancel,
        ));
        let forwarder = tokio::spawn(forwarder::run_forwarder(queue, reporter, cluster_id));

        Self {
            subscriber,
            forwarder,
        }
    }

    pub async fn join(self) {
        let _ = self.subscriber.await;
        let _ = self.forwarder.await;
    }
}
