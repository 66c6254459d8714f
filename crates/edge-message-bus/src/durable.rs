use crate::traits::{DurableBus, MessageHandler};
use async_trait::async_trait;
use edge_core_types::errors::{ErrorClass, PublishError, SubscribeError};
use redis::cluster::ClusterClient;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Client, Commands, RedisError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use RedisClientOptions::{Cluster, Single};

/// How long a single XREAD BLOCK call waits before returning empty, so the
/// subscribe loop gets a chance to notice the cancellation token.
const READ_BLOCK_MS: usize = 5_000;

/// Producers cap each topic's stream length with trim-on-write.
const DEFAULT_STREAM_CAP: usize = 1_000;

enum RedisClientOptions {
    Single(Client),
    Cluster(ClusterClient),
}

fn classify(err: &RedisError) -> ErrorClass {
    if err.is_io_error() {
        ErrorClass::StreamDisconnect
    } else {
        ErrorClass::UnexpectedError
    }
}

/// The inter-proxy durable bus: an append-only Redis stream per topic, with a
/// monotonically increasing entry id supplied by Redis itself (`*`).
pub struct RedisDurableBus {
    client: Arc<RwLock<RedisClientOptions>>,
    read_timeout: Duration,
    write_timeout: Duration,
    stream_cap: usize,
}

impl RedisDurableBus {
    pub fn new(
        url: &str,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, edge_core_types::EdgeError> {
        let client = Client::open(url)?;
        info!("[durable bus] configured single-node redis client");
        Ok(Self {
            client: Arc::new(RwLock::new(Single(client))),
            read_timeout,
            write_timeout,
            stream_cap: DEFAULT_STREAM_CAP,
        })
    }

    pub fn new_with_cluster(
        urls: Vec<String>,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, edge_core_types::EdgeError> {
        info!("[durable bus] configuring cluster redis client against {urls:?}");
        let client = ClusterClient::builder(urls)
            .connection_timeout(read_timeout)
            .build()?;
        Ok(Self {
            client: Arc::new(RwLock::new(Cluster(client))),
            read_timeout,
            write_timeout,
            stream_cap: DEFAULT_STREAM_CAP,
        })
    }

    pub fn with_stream_cap(mut self, cap: usize) -> Self {
        self.stream_cap = cap;
        self
    }
}

#[async_trait]
impl DurableBus for RedisDurableBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<String, PublishError> {
        let mut client = self.client.write().await;
        let result: Result<String, RedisError> = match &mut *client {
            Single(c) => {
                let mut conn = c
                    .get_multiplexed_tokio_connection_with_response_timeouts(
                        self.write_timeout,
                        self.write_timeout,
                    )
                    .await?;
                conn.xadd_maxlen(
                    topic,
                    StreamMaxlen::Approx(self.stream_cap),
                    "*",
                    &[("data", payload)],
                )
                .await
            }
            Cluster(c) => {
                let mut conn = c.get_connection()?;
                conn.xadd_maxlen(
                    topic,
                    StreamMaxlen::Approx(self.stream_cap),
                    "*",
                    &[("data", payload)],
                )
            }
        };
        result.map_err(|e| PublishError {
            class: classify(&e),
            message: e.to_string(),
        })
    }

    async fn subscribe(
        &self,
        topic: &str,
        from_id: &str,
        handler: Arc<dyn MessageHandler>,
        cancel: CancellationToken,
    ) -> Result<(), SubscribeError> {
        let mut last_id = if from_id.is_empty() {
            "$".to_string()
        } else {
            from_id.to_string()
        };

        loop {
            if cancel.is_cancelled() {
                debug!("subscription to {topic} cancelled");
                return Ok(());
            }

            let opts = StreamReadOptions::default().block(READ_BLOCK_MS);
            let reply = {
                let mut client = self.client.write().await;
                let read: Result<StreamReadReply, RedisError> = match &mut *client {
                    Single(c) => {
                        let mut conn = c
                            .get_multiplexed_tokio_connection_with_response_timeouts(
                                self.read_timeout,
                                self.read_timeout,
                            )
                            .await?;
                        conn.xread_options(&[topic], &[last_id.as_str()], &opts)
                            .await
                    }
                    Cluster(c) => {
                        let mut conn = c.get_connection()?;
                        conn.xread_options(&[topic], &[last_id.as_str()], &opts)
                    }
                };
                read
            };

            let reply = match reply {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("subscription to {topic} hit a transport error: {e}");
                    return Err(SubscribeError {
                        class: classify(&e),
                        message: e.to_string(),
                    });
                }
            };

            for key in reply.keys {
                for entry in key.ids {
                    let payload: Vec<u8> = entry
                        .map
                        .get("data")
                        .and_then(|v| redis::from_redis_value(v).ok())
                        .unwrap_or_default();
                    if let Err(e) = handler.handle(&entry.id, &payload).await {
                        warn!("handler failed for message {} on {topic}: {e}", entry.id);
                    }
                    last_id = entry.id;
                }
            }
        }
    }
}

impl From<RedisError> for PublishError {
    fn from(err: RedisError) -> Self {
        PublishError {
            class: classify(&err),
            message: err.to_string(),
        }
    }
}

impl From<RedisError> for SubscribeError {
    fn from(err: RedisError) -> Self {
        SubscribeError {
            class: classify(&err),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MessageHandler;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use testcontainers::{ContainerAsync, runners::AsyncRunner};
    use testcontainers_modules::redis::RedisStack;

    const TEST_TIMEOUT: Duration = Duration::from_millis(1000);

    async fn setup_redis() -> (String, ContainerAsync<RedisStack>) {
        let node = RedisStack::default().start().await.expect("start redis");
        let port = node.get_host_port_ipv4(6379).await.expect("get port");
        (format!("redis://127.0.0.1:{port}"), node)
    }

    struct CollectingHandler {
        seen: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl MessageHandler for CollectingHandler {
        async fn handle(&self, id: &str, payload: &[u8]) -> Result<(), edge_core_types::EdgeError> {
            self.seen
                .lock()
                .unwrap()
                .push((id.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_then_subscribe_from_tail_sees_new_messages_in_order() {
        let (url, _node) = setup_redis().await;
        let bus = RedisDurableBus::new(&url, TEST_TIMEOUT, TEST_TIMEOUT).unwrap();

        let handler = Arc::new(CollectingHandler {
            seen: Mutex::new(Vec::new()),
        });
        let cancel = CancellationToken::new();
        let sub_cancel = cancel.clone();
        let handler_for_task = handler.clone();
        let subscriber = tokio::spawn(async move {
            bus.subscribe("env-1", "", handler_for_task, sub_cancel)
                .await
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        let publisher = RedisDurableBus::new(&url, TEST_TIMEOUT, TEST_TIMEOUT).unwrap();
        publisher.publish("env-1", b"first".to_vec()).await.unwrap();
        publisher
            .publish("env-1", b"second".to_vec())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();
        subscriber.await.unwrap().unwrap();

        let seen = handler.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].1, b"first".to_vec());
        assert_eq!(seen[1].1, b"second".to_vec());
    }
}
