use crate::aggregator::MetricsAggregator;
use edge_core_types::MetricRecord;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type MetricsSnapshot = HashMap<String, MetricRecord>;

/// Tags which sub-queue a flushed snapshot originated from; both sub-queues share
/// one outbound channel so the forwarder only has to read a single stream.
#[derive(Debug, Clone)]
pub enum QueuedBatch {
    Evaluation(MetricsSnapshot),
    Target(MetricsSnapshot),
}

const DEFAULT_BOUND_BYTES: u64 = 1024 * 1024;

/// One half of the metrics queue: its own aggregator, its own size bound, its own
/// flush ticker. Distinct sub-queues may flush and interleave on the shared
/// outbound channel independently of one another.
struct SubQueue {
    aggregator: Arc<MetricsAggregator>,
    bound_bytes: u64,
    reset_ticker: Notify,
    wrap: fn(MetricsSnapshot) -> QueuedBatch,
}

impl SubQueue {
    fn new(bound_bytes: u64, wrap: fn(MetricsSnapshot) -> QueuedBatch) -> Self {
        Self {
            aggregator: Arc::new(MetricsAggregator::new()),
            bound_bytes,
            reset_ticker: Notify::new(),
            wrap,
        }
    }

    /// Aggregates `record`; if doing so would keep the bucket under bound, just
    /// stores it. If the bucket is already at or past bound, synchronously pushes
    /// the current snapshot out first, flushes, resets the ticker, then stores the
    /// new record into the now-empty bucket.
    async fn store(
        &self,
        record: &MetricRecord,
        outbound: &mpsc::Sender<QueuedBatch>,
        cancel: &CancellationToken,
    ) -> Result<(), ()> {
        if record.metrics_data.is_empty() && record.target_data.is_empty() {
            return Ok(());
        }

        if self.aggregator.size() >= self.bound_bytes {
            self.push_and_flush(outbound, cancel).await?;
        }
        self.aggregator.add(record);
        Ok(())
    }

    async fn push_and_flush(
        &self,
        outbound: &mpsc::Sender<QueuedBatch>,
        cancel: &CancellationToken,
    ) -> Result<(), ()> {
        let snapshot = self.aggregator.get();
        if snapshot.values().all(|r| r.metrics_data.is_empty() && r.target_data.is_empty()) {
            self.aggregator.flush();
            return Ok(());
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(()),
            send_result = outbound.send((self.wrap)(snapshot)) => {
                send_result.map_err(|_| ())?;
            }
        }
        self.aggregator.flush();
        self.reset_ticker.notify_one();
        Ok(())
    }

    /// Runs until `cancel`, pushing a non-empty snapshot on every tick and resetting
    /// the ticker whenever `store` already pushed one out-of-band. Empty ticks are
    /// no-ops and deliberately do not reset the ticker.
    async fn run_flush_loop(
        self: Arc<Self>,
        interval: Duration,
        outbound: mpsc::Sender<QueuedBatch>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("metrics sub-queue flush loop cancelled");
                    return;
                }
                _ = self.reset_ticker.notified() => {
                    ticker.reset();
                }
                _ = ticker.tick() => {
                    if self.aggregator.size() > 0 {
                        let _ = self.push_and_flush(&outbound, &cancel).await;
                    }
                }
            }
        }
    }
}

/// Two independent sub-queues (evaluation metrics, target metrics) sharing one
/// outbound channel that the metrics worker's forwarder drains.
pub struct MetricsQueue {
    evaluation: Arc<SubQueue>,
    target: Arc<SubQueue>,
    outbound_tx: mpsc::Sender<QueuedBatch>,
    outbound_rx: Mutex<Option<mpsc::Receiver<QueuedBatch>>>,
    per_target_analytics: bool,
}

impl MetricsQueue {
    pub fn new(flush_interval: Duration, cancel: CancellationToken) -> Self {
        Self::with_bounds(
            DEFAULT_BOUND_BYTES,
            DEFAULT_BOUND_BYTES,
            flush_interval,
            false,
            cancel,
        )
    }

    pub fn with_bounds(
        evaluation_bound_bytes: u64,
        target_bound_bytes: u64,
        flush_interval: Duration,
        per_target_analytics: bool,
        cancel: CancellationToken,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let evaluation = Arc::new(SubQueue::new(evaluation_bound_bytes, QueuedBatch::Evaluation));
        let target = Arc::new(SubQueue::new(target_bound_bytes, QueuedBatch::Target));

        tokio::spawn(evaluation.clone().run_flush_loop(
            flush_interval,
            outbound_tx.clone(),
            cancel.clone(),
        ));
        tokio::spawn(target.clone().run_flush_loop(flush_interval, outbound_tx.clone(), cancel));

        Self {
            evaluation,
            target,
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            per_target_analytics,
        }
    }

    /// Splits `record` into metrics-only and target-only copies and stores each
    /// into its own sub-queue. When `per_target_analytics` is disabled (the
    /// default), the metrics-only copy is routed through
    /// `MetricsAggregator::aggregate_target_analytics` first so any `target`
    /// attribute is collapsed to the global sentinel before it ever reaches the
    /// evaluation bucket; enabling the flag skips that rewrite and lets real
    /// per-target identifiers flow through untouched. Propagates cancellation if a
    /// size-triggered push is in flight when `cancel` fires.
    pub async fn store_metrics(
        &self,
        record: &MetricRecord,
        cancel: &CancellationToken,
    ) -> Result<(), ()> {
        let (metrics_only, targets_only) = record.split();
        let metrics_only = if !self.per_target_analytics && !metrics_only.metrics_data.is_empty() {
            match MetricsAggregator::aggregate_target_analytics(&metrics_only) {
                Ok(normalized) => MetricRecord {
                    metrics_data: normalized,
                    ..metrics_only
                },
                Err(_) => metrics_only,
            }
        } else {
            metrics_only
        };

        self.evaluation
            .store(&metrics_only, &self.outbound_tx, cancel)
            .await?;
        self.target.store(&targets_only, &self.outbound_tx, cancel).await
    }

    /// Takes the shared receiver; panics if called more than once. Closes when the
    /// queue's cancellation token fires, since the flush loops stop producing.
    pub async fn listen(&self) -> mpsc::Receiver<QueuedBatch> {
        self.outbound_rx
            .lock()
            .await
            .take()
            .expect("MetricsQueue::listen called more than once")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core_types::MetricDatum;
    use pretty_assertions::assert_eq;

    fn datum() -> MetricDatum {
        MetricDatum {
            attributes: vec![("featureIdentifier".to_string(), "flag".to_string())],
            count: 1,
            metrics_type: "evaluation".to_string(),
            timestamp: 0,
        }
    }

    fn datum_with_target(target: &str) -> MetricDatum {
        MetricDatum {
            attributes: vec![
                ("featureIdentifier".to_string(), "flag".to_string()),
                ("target".to_string(), target.to_string()),
            ],
            count: 1,
            metrics_type: "evaluation".to_string(),
            timestamp: 0,
        }
    }

    fn record(size: u64) -> MetricRecord {
        MetricRecord {
            environment_id: "env-1".to_string(),
            metrics_data: vec![datum()],
            target_data: Vec::new(),
            size,
        }
    }

    #[tokio::test]
    async fn store_under_bound_does_not_push_until_tick() {
        let cancel = CancellationToken::new();
        let queue = MetricsQueue::with_bounds(1024, 1024, Duration::from_secs(60), false, cancel.clone());
        let mut rx = queue.listen().await;

        queue.store_metrics(&record(10), &cancel).await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(result.is_err(), "expected no push before bound or tick");
        cancel.cancel();
    }

    #[tokio::test]
    async fn store_at_bound_pushes_synchronously() {
        let cancel = CancellationToken::new();
        let queue = MetricsQueue::with_bounds(5, 1024, Duration::from_secs(60), false, cancel.clone());
        let mut rx = queue.listen().await;

        queue.store_metrics(&record(10), &cancel).await.unwrap();
        queue.store_metrics(&record(10), &cancel).await.unwrap();

        let batch = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("expected a push once bound was reached")
            .unwrap();
        match batch {
            QueuedBatch::Evaluation(snapshot) => {
                assert_eq!(snapshot.get("env-1").unwrap().metrics_data.len(), 1);
            }
            QueuedBatch::Target(_) => panic!("expected evaluation batch"),
        }
        cancel.cancel();
    }

    #[tokio::test]
    async fn empty_ticks_are_no_ops() {
        let cancel = CancellationToken::new();
        let queue = MetricsQueue::with_bounds(1024, 1024, Duration::from_millis(20), false, cancel.clone());
        let mut rx = queue.listen().await;

        let result = tokio::time::timeout(Duration::from_millis(80), rx.recv()).await;
        assert!(result.is_err(), "empty sub-queues must not push on tick");
        cancel.cancel();
    }

    #[tokio::test]
    async fn per_target_analytics_disabled_normalizes_target_to_sentinel() {
        let cancel = CancellationToken::new();
        let queue = MetricsQueue::with_bounds(1024, 1024, Duration::from_secs(60), false, cancel.clone());
        let mut rx = queue.listen().await;

        let rec = MetricRecord {
            environment_id: "env-1".to_string(),
            metrics_data: vec![datum_with_target("user-42"), datum_with_target("user-99")],
            target_data: Vec::new(),
            size: 10,
        };
        queue.store_metrics(&rec, &cancel).await.unwrap();

        let snapshot = queue.evaluation.aggregator.get();
        let env = snapshot.get("env-1").unwrap();
        assert_eq!(env.metrics_data.len(), 1);
        assert_eq!(
            edge_core_types::metrics::attribute(&env.metrics_data[0].attributes, "target"),
            Some(edge_core_types::metrics::GLOBAL_TARGET_SENTINEL)
        );
        assert_eq!(env.metrics_data[0].count, 2);
        cancel.cancel();
        drop(rx.try_recv());
    }

    #[tokio::test]
    async fn per_target_analytics_enabled_preserves_real_targets() {
        let cancel = CancellationToken::new();
        let queue = MetricsQueue::with_bounds(1024, 1024, Duration::from_secs(60), true, cancel.clone());
        let mut rx = queue.listen().await;

        let rec = MetricRecord {
            environment_id: "env-1".to_string(),
            metrics_data: vec![datum_with_target("user-42"), datum_with_target("user-99")],
            target_data: Vec::new(),
            size: 10,
        };
        queue.store_metrics(&rec, &cancel).await.unwrap();

        let snapshot = queue.evaluation.aggregator.get();
        let env = snapshot.get("env-1").unwrap();
        // AggregationKey ignores `target`, so both data points still collapse into
        // one entry by (flag, variation, sdk); what this asserts is that the raw
        // attribute value survives instead of being rewritten to the sentinel.
        assert_eq!(env.metrics_data.len(), 1);
        assert_ne!(
            edge_core_types::metrics::attribute(&env.metrics_data[0].attributes, "target"),
            Some(edge_core_types::metrics::GLOBAL_TARGET_SENTINEL)
        );
        cancel.cancel();
        drop(rx.try_recv());
    }
}
