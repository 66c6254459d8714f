use crate::registry::OpenTopicRegistry;
use async_trait::async_trait;
use edge_fanout::FanOutPublisher;
use edge_sse_ingestor::ConnectionObserver;
use edge_stream_health::StreamHealth;
use std::sync::Arc;
use tracing::warn;

/// The Replica side of the same lifecycle contract. A Replica never talks to the
/// SaaS backend directly, so its disconnect handling is just SDK fan-out eviction;
/// there is no poller to invoke.
pub struct ReplicaLifecycle {
    health: Arc<StreamHealth>,
    fanout: Arc<FanOutPublisher>,
    topics: Arc<OpenTopicRegistry>,
}

impl ReplicaLifecycle {
    pub fn new(health: Arc<StreamHealth>, fanout: Arc<FanOutPublisher>, topics: Arc<OpenTopicRegistry>) -> Self {
        Self {
            health,
            fanout,
            topics,
        }
    }
}

#[async_trait]
impl ConnectionObserver for ReplicaLifecycle {
    async fn on_disconnect(&self) {
        let now = chrono::Utc::now().timestamp_millis();
        let _ = self.health.set_unhealthy(now).await;

        for topic in self.topics.snapshot() {
            if let Err(e) = self.fanout.close(&topic).await {
                warn!(topic, error = %e, "failed to close SDK fan-out topic, continuing");
            }
        }
    }

    async fn on_connect(&self) {
        let now = chrono::Utc::now().timestamp_millis();
        let _ = self.health.set_healthy(now).await;
    }
}
