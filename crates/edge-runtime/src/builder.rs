use crate::config::RuntimeConfig;
use edge_change_forwarder::ChangeForwarder;
use edge_fanout::FanOutPublisher;
use edge_lifecycle::{OpenTopicRegistry, PrimaryLifecycle, ReplicaLifecycle, SaasPoller};
use edge_message_bus::{DurableBus, FanOutBus};
use edge_metrics::MetricsQueue;
use edge_metrics_worker::{MetricsReporter, MetricsWorker};
use edge_sse_ingestor::{ChangeEventHandler, SseIngestor, SseIngestorConfig};
use edge_stream_health::{HealthCache, StreamHealth};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything shared between Primary and Replica roles: stream health, the set of
/// currently-open SDK fan-out topics, and the metrics pipeline. Backend-specific
/// pieces (the durable bus, the fan-out bus, the health cache) are supplied by the
/// caller as trait objects; this crate only wires the generic pieces together.
pub struct SharedRuntime {
    pub health: Arc<StreamHealth>,
    pub topics: Arc<OpenTopicRegistry>,
    pub fanout: Arc<FanOutPublisher>,
    pub metrics_queue: Arc<MetricsQueue>,
    pub cancel: CancellationToken,
}

pub struct RuntimeBuilder {
    config: RuntimeConfig,
    cache_key: String,
    health_cache: Arc<dyn HealthCache>,
    fanout_bus: Arc<dyn FanOutBus>,
    cancel: CancellationToken,
}

impl RuntimeBuilder {
    pub fn new(
        config: RuntimeConfig,
        cache_key: String,
        health_cache: Arc<dyn HealthCache>,
        fanout_bus: Arc<dyn FanOutBus>,
    ) -> Self {
        Self {
            config,
            cache_key,
            health_cache,
            fanout_bus,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build_shared(self, now: i64) -> SharedRuntime {
        let health = Arc::new(StreamHealth::new(self.cache_key, self.health_cache, now));
        let topics = Arc::new(OpenTopicRegistry::new());
        let fanout = Arc::new(FanOutPublisher::new(self.fanout_bus));
        let metrics_queue = Arc::new(MetricsQueue::with_bounds(
            self.config.metrics_evaluation_bound_bytes,
            self.config.metrics_target_bound_bytes,
            self.config.metrics_flush_interval,
            self.config.per_target_analytics,
            self.cancel.clone(),
        ));

        tokio::spawn(health.clone().verify(self.config.health_verify_interval, self.cancel.clone()));

        SharedRuntime {
            health,
            topics,
            fanout,
            metrics_queue,
            cancel: self.cancel,
        }
    }
}

/// Wires a Primary deployment: one upstream SSE subscription, a lifecycle
/// orchestrator that polls and reloads config around disconnects, and the metrics
/// worker that forwards SDK-reported metrics upstream.
pub struct PrimaryRuntime {
    pub shared: SharedRuntime,
    pub ingestor: Arc<SseIngestor>,
    pub lifecycle: Arc<PrimaryLifecycle>,
    pub metrics_worker: MetricsWorker,
}

impl PrimaryRuntime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shared: SharedRuntime,
        sse_config: SseIngestorConfig,
        inner_handler: Arc<dyn ChangeEventHandler>,
        durable_bus: Arc<dyn DurableBus>,
        poller: Arc<dyn SaasPoller>,
        metrics_reporter: Arc<dyn MetricsReporter>,
        cluster_id: String,
        metrics_consumer_concurrency: usize,
    ) -> Self {
        let lifecycle = Arc::new(PrimaryLifecycle::new(
            shared.health.clone(),
            poller,
            shared.fanout.clone(),
            durable_bus.clone(),
            shared.topics.clone(),
        ));

        let forwarder = Arc::new(ChangeForwarder::new(
            inner_handler,
            durable_bus.clone(),
            shared.fanout.clone(),
        ));
        let ingestor = Arc::new(SseIngestor::new(sse_config, forwarder, lifecycle.clone()));

        let metrics_worker = MetricsWorker::spawn_with_concurrency(
            durable_bus,
            shared.metrics_queue.clone(),
            metrics_reporter,
            cluster_id,
            metrics_consumer_concurrency,
            shared.cancel.clone(),
        );

        Self {
            shared,
            ingestor,
            lifecycle,
            metrics_worker,
        }
    }

    pub async fn run(&self) {
        self.ingestor.subscribe(self.shared.cancel.clone()).await;
    }
}

/// Wires a Replica deployment: no direct SaaS connection, just the bus-driven
/// lifecycle reacting to the Primary's broadcast connect/disconnect events and the
/// per-environment change topics forwarding straight through to SDK fan-out.
pub struct ReplicaRuntime {
    pub shared: SharedRuntime,
    pub lifecycle: Arc<ReplicaLifecycle>,
}

impl ReplicaRuntime {
    pub fn new(shared: SharedRuntime) -> Self {
        let lifecycle = Arc::new(ReplicaLifecycle::new(
            shared.health.clone(),
            shared.fanout.clone(),
            shared.topics.clone(),
        ));

        Self { shared, lifecycle }
    }
}
