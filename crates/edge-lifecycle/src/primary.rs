use crate::poller::SaasPoller;
use crate::registry::OpenTopicRegistry;
use async_trait::async_trait;
use edge_core_types::{ChangeDomain, ChangeEvent, STREAM_ACTION_TOPIC};
use edge_fanout::FanOutPublisher;
use edge_message_bus::DurableBus;
use edge_sse_ingestor::ConnectionObserver;
use edge_stream_health::StreamHealth;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Lifecycle-orchestrated polls and bus publishes each get a 1-minute timeout;
/// a timeout is logged exactly like any other failure and never propagated.
const LIFECYCLE_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Wires StreamHealth, the SaaS poller, SDK fan-out, and the inter-proxy bus
/// together around the Primary's single upstream SSE subscription. Built as an
/// `edge_sse_ingestor::ConnectionObserver` so `SseIngestor` never needs to know
/// about any of this; it just invokes opaque callbacks.
pub struct PrimaryLifecycle {
    health: Arc<StreamHealth>,
    poller: Arc<dyn SaasPoller>,
    fanout: Arc<FanOutPublisher>,
    bus: Arc<dyn DurableBus>,
    topics: Arc<OpenTopicRegistry>,
    polling: AtomicBool,
}

impl PrimaryLifecycle {
    pub fn new(
        health: Arc<StreamHealth>,
        poller: Arc<dyn SaasPoller>,
        fanout: Arc<FanOutPublisher>,
        bus: Arc<dyn DurableBus>,
        topics: Arc<OpenTopicRegistry>,
    ) -> Self {
        Self {
            health,
            poller,
            fanout,
            bus,
            topics,
            polling: AtomicBool::new(false),
        }
    }

    pub fn is_polling(&self) -> bool {
        self.polling.load(Ordering::SeqCst)
    }

    async fn publish_stream_action(&self, domain: ChangeDomain) {
        let event = ChangeEvent::stream_action(domain);
        match serde_json::to_vec(&event) {
            Ok(payload) => {
                match tokio::time::timeout(
                    LIFECYCLE_CALL_TIMEOUT,
                    self.bus.publish(STREAM_ACTION_TOPIC, payload),
                )
                .await
                {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "failed to broadcast stream_action to replicas"),
                    Err(_) => warn!("timed out broadcasting stream_action to replicas"),
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize stream_action event"),
        }
    }

    async fn close_all_open_topics(&self) {
        for topic in self.topics.snapshot() {
            if let Err(e) = self.fanout.close(&topic).await {
                warn!(topic, error = %e, "failed to close SDK fan-out topic, continuing");
            }
        }
    }
}

#[async_trait]
impl ConnectionObserver for PrimaryLifecycle {
    async fn on_disconnect(&self) {
        self.polling.store(true, Ordering::SeqCst);
        let now = chrono::Utc::now().timestamp_millis();
        let _ = self.health.set_unhealthy(now).await;

        match tokio::time::timeout(LIFECYCLE_CALL_TIMEOUT, self.poller.poll()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "SaaS poll while disconnected failed, will not retry until next disconnect")
            }
            Err(_) => warn!("SaaS poll while disconnected timed out, will not retry until next disconnect"),
        }

        self.close_all_open_topics().await;
        self.publish_stream_action(ChangeDomain::Disconnect).await;
    }

    async fn on_connect(&self) {
        let was_disconnected = self.health.status().await.state == edge_core_types::StreamState::Disconnected;

        if was_disconnected {
            match tokio::time::timeout(LIFECYCLE_CALL_TIMEOUT, self.poller.reload_config()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %e, "config reload after reconnect failed"),
                Err(_) => warn!("config reload after reconnect timed out"),
            }
        }

        self.polling.store(false, Ordering::SeqCst);
        let now = chrono::Utc::now().timestamp_millis();
        let _ = self.health.set_healthy(now).await;
        self.publish_stream_action(ChangeDomain::Connect).await;
    }
}
