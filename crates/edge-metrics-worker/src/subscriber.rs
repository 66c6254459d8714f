use async_trait::async_trait;
use edge_core_types::{EdgeError, MetricRecord, SDK_METRICS_TOPIC};
use edge_message_bus::{DurableBus, MessageHandler};
use edge_metrics::MetricsQueue;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const RESUBSCRIBE_BACKOFF_SECS: u64 = 30;

/// Pushes every raw `sdk_metrics` message onto an internal channel so decode and
/// `MetricsQueue::store_metrics` work happens off the bus's own delivery loop,
/// letting several consumer tasks process messages concurrently. Count-based
/// aggregation is commutative, so out-of-order processing across messages is safe.
struct RawMessageForwarder {
    tx: mpsc::Sender<(String, Vec<u8>)>,
    last_id: Arc<Mutex<String>>,
}

#[async_trait]
impl MessageHandler for RawMessageForwarder {
    async fn handle(&self, id: &str, payload: &[u8]) -> Result<(), EdgeError> {
        self.tx
            .send((id.to_string(), payload.to_vec()))
            .await
            .map_err(|_| EdgeError::ContextCancelled)?;
        *self.last_id.lock().await = id.to_string();
        Ok(())
    }
}

async fn run_consumer(
    rx: Arc<Mutex<mpsc::Receiver<(String, Vec<u8>)>>>,
    queue: Arc<MetricsQueue>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                item = rx.recv() => item,
            }
        };
        let Some((id, payload)) = next else {
            return;
        };

        let record: MetricRecord = match serde_json::from_slice(&payload) {
            Ok(record) => record,
            Err(e) => {
                warn!(message_id = %id, error = %e, "dropping undecodable sdk metrics message");
                continue;
            }
        };

        if queue.store_metrics(&record, &cancel).await.is_err() {
            return;
        }
    }
}

/// Subscribes to the `sdk_metrics` bus topic (Primary-only: Replicas publish onto
/// it, never subscribe) and fans decoded records out to `concurrency` consumer
/// tasks, each storing into `queue`.
pub async fn run_subscriber(
    bus: Arc<dyn DurableBus>,
    queue: Arc<MetricsQueue>,
    concurrency: usize,
    cancel: CancellationToken,
) {
    let last_id = Arc::new(Mutex::new(String::new()));
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let (tx, rx) = mpsc::channel(256);
        let rx = Arc::new(Mutex::new(rx));
        let mut consumers = Vec::with_capacity(concurrency);
        for _ in 0..concurrency.max(1) {
            consumers.push(tokio::spawn(run_consumer(
                rx.clone(),
                queue.clone(),
                cancel.clone(),
            )));
        }

        let handler = Arc::new(RawMessageForwarder {
            tx: tx.clone(),
            last_id: last_id.clone(),
        });
        drop(tx);
        let from_id = last_id.lock().await.clone();
        let result = bus
            .subscribe(SDK_METRICS_TOPIC, &from_id, handler, cancel.clone())
            .await;

        for consumer in consumers {
            let _ = consumer.await;
        }

        if cancel.is_cancelled() {
            return;
        }

        match result {
            Ok(()) => {
                info!("sdk_metrics subscription ended without error, resubscribing from last known id");
            }
            Err(e) => {
                warn!(error = %e, "sdk_metrics subscription failed, backing off");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(std::time::Duration::from_secs(RESUBSCRIBE_BACKOFF_SECS)) => {}
                }
            }
        }
    }
}
