use async_trait::async_trait;
use edge_core_types::{ChangeEvent, EdgeError};
use edge_fanout::FanOutPublisher;
use edge_message_bus::DurableBus;
use edge_sse_ingestor::ChangeEventHandler;
use std::sync::Arc;
use tracing::warn;

/// Wraps an inner handler in the SSE ingestion chain. Once the inner handler
/// succeeds, decides whether to republish the event onto the inter-proxy bus or,
/// for removal events, to evict SDK fan-out subscribers instead. If the inner
/// handler fails, nothing downstream is republished for that event.
pub struct ChangeForwarder {
    inner: Arc<dyn ChangeEventHandler>,
    bus: Arc<dyn DurableBus>,
    fanout: Arc<FanOutPublisher>,
    /// Overrides the bus topic derived from `event.environment`, if set.
    topic_override: Option<String>,
}

impl ChangeForwarder {
    pub fn new(
        inner: Arc<dyn ChangeEventHandler>,
        bus: Arc<dyn DurableBus>,
        fanout: Arc<FanOutPublisher>,
    ) -> Self {
        Self {
            inner,
            bus,
            fanout,
            topic_override: None,
        }
    }

    pub fn with_topic_override(mut self, topic: String) -> Self {
        self.topic_override = Some(topic);
        self
    }

    async fn close_removed_environments(&self, event: &ChangeEvent) {
        for environment in &event.environments {
            if let Err(e) = self.fanout.close(environment).await {
                warn!(
                    environment,
                    error = %e,
                    "failed to close SDK fan-out topic for removed environment, continuing with the rest"
                );
            }
        }
    }

    async fn republish(&self, event: &ChangeEvent) {
        let topic = match self
            .topic_override
            .clone()
            .or_else(|| event.environment.clone())
        {
            Some(topic) => topic,
            None => {
                warn!("change event has no environment and no topic override, dropping");
                return;
            }
        };

        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to serialize change event for republish");
                return;
            }
        };

        if let Err(e) = self.bus.publish(&topic, payload).await {
            warn!(topic, error = %e, "failed to republish change event onto the bus");
        }
    }
}

#[async_trait]
impl ChangeEventHandler for ChangeForwarder {
    async fn handle(&self, event: ChangeEvent) -> Result<(), EdgeError> {
        self.inner.handle(event.clone()).await?;

        if !event.should_forward() {
            return Ok(());
        }

        if event.is_removal() {
            self.close_removed_environments(&event).await;
        } else {
            self.republish(&event).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core_types::{ChangeDomain, ChangeEventKind, PublishError, SubscribeError};
    use edge_message_bus::{InMemoryFanOutBus, MessageHandler};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl DurableBus for RecordingBus {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, PublishError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
            Ok("1-0".to_string())
        }

        async fn subscribe(
            &self,
            _topic: &str,
            _from_id: &str,
            _handler: Arc<dyn MessageHandler>,
            _cancel: CancellationToken,
        ) -> Result<(), SubscribeError> {
            Ok(())
        }
    }

    struct RecordingHandler {
        seen: Mutex<Vec<ChangeEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl ChangeEventHandler for RecordingHandler {
        async fn handle(&self, event: ChangeEvent) -> Result<(), EdgeError> {
            self.seen.lock().unwrap().push(event);
            if self.fail {
                Err(EdgeError::TransportError("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    fn patch_event(environment: &str) -> ChangeEvent {
        ChangeEvent {
            event: ChangeEventKind::Patch,
            domain: ChangeDomain::Feature,
            identifier: Some("flag-1".to_string()),
            version: Some(1),
            environment: Some(environment.to_string()),
            environments: Vec::new(),
            api_key: None,
        }
    }

    fn removal_event(environments: Vec<&str>) -> ChangeEvent {
        ChangeEvent {
            event: ChangeEventKind::EnvironmentRemoved,
            domain: ChangeDomain::Other,
            identifier: None,
            version: None,
            environment: None,
            environments: environments.into_iter().map(String::from).collect(),
            api_key: None,
        }
    }

    #[tokio::test]
    async fn s4_non_matching_domain_and_event_is_not_forwarded() {
        let bus = Arc::new(RecordingBus::default());
        let fanout = Arc::new(FanOutPublisher::new(Arc::new(InMemoryFanOutBus::default())));
        let inner = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        let forwarder = ChangeForwarder::new(inner, bus.clone(), fanout);

        let mut other_domain_event = patch_event("env-1");
        other_domain_event.domain = ChangeDomain::Other;
        other_domain_event.event = ChangeEventKind::Other;

        forwarder.handle(other_domain_event).await.unwrap();

        assert!(bus.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn feature_patch_republishes_to_environment_topic() {
        let bus = Arc::new(RecordingBus::default());
        let fanout = Arc::new(FanOutPublisher::new(Arc::new(InMemoryFanOutBus::default())));
        let inner = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        let forwarder = ChangeForwarder::new(inner, bus.clone(), fanout);

        forwarder.handle(patch_event("env-1")).await.unwrap();

        let published = bus.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "env-1");
    }

    #[tokio::test]
    async fn s5_removal_event_closes_every_environment_and_does_not_publish() {
        let bus = Arc::new(RecordingBus::default());
        let inmem_fanout = Arc::new(InMemoryFanOutBus::default());
        let fanout = Arc::new(FanOutPublisher::new(inmem_fanout));
        let inner = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        let forwarder = ChangeForwarder::new(inner, bus.clone(), fanout);

        forwarder
            .handle(removal_event(vec!["E1", "E2"]))
            .await
            .unwrap();

        assert!(bus.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_inner_handler_suppresses_republish() {
        let bus = Arc::new(RecordingBus::default());
        let fanout = Arc::new(FanOutPublisher::new(Arc::new(InMemoryFanOutBus::default())));
        let inner = Arc::new(RecordingHandler {
            seen: Mutex::new(Vec::new()),
            fail: true,
        });
        let forwarder = ChangeForwarder::new(inner, bus.clone(), fanout);

        let result = forwarder.handle(patch_event("env-1")).await;

        assert!(result.is_err());
        assert!(bus.published.lock().unwrap().is_empty());
    }
}
