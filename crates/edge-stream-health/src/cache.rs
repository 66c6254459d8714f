use async_trait::async_trait;
use edge_core_types::{EdgeResult, StreamStatus};
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// The only persisted state this core depends on: a stream-status record keyed by a
/// deployment-scoped string, so replicas can observe the Primary's health.
#[async_trait]
pub trait HealthCache: Send + Sync {
    async fn write(&self, key: &str, status: StreamStatus) -> EdgeResult<()>;
    async fn read(&self, key: &str) -> EdgeResult<Option<StreamStatus>>;
}

pub struct RedisHealthCache {
    client: RwLock<Client>,
    timeout: Duration,
}

impl RedisHealthCache {
    pub fn new(url: &str, timeout: Duration) -> EdgeResult<Self> {
        let client = Client::open(url)?;
        info!("[stream health] configured redis cache client");
        Ok(Self {
            client: RwLock::new(client),
            timeout,
        })
    }
}

#[async_trait]
impl HealthCache for RedisHealthCache {
    async fn write(&self, key: &str, status: StreamStatus) -> EdgeResult<()> {
        debug!("writing stream status {:?} for {key}", status.state);
        let mut client = self.client.write().await;
        let mut conn = client
            .get_multiplexed_tokio_connection_with_response_timeouts(self.timeout, self.timeout)
            .await?;
        let raw = serde_json::to_string(&status)?;
        let _: () = conn.set(key, raw).await?;
        Ok(())
    }

    async fn read(&self, key: &str) -> EdgeResult<Option<StreamStatus>> {
        let mut client = self.client.write().await;
        let mut conn = client
            .get_multiplexed_tokio_connection_with_response_timeouts(self.timeout, self.timeout)
            .await?;
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core_types::StreamState;
    use pretty_assertions::assert_eq;
    use testcontainers::{ContainerAsync, runners::AsyncRunner};
    use testcontainers_modules::redis::RedisStack;

    const TEST_TIMEOUT: Duration = Duration::from_millis(1000);

    async fn setup_redis() -> (String, ContainerAsync<RedisStack>) {
        let node = RedisStack::default().start().await.expect("start redis");
        let port = node.get_host_port_ipv4(6379).await.expect("get port");
        (format!("redis://127.0.0.1:{port}"), node)
    }

    #[tokio::test]
    async fn write_then_read_round_trips_status() {
        let (url, _node) = setup_redis().await;
        let cache = RedisHealthCache::new(&url, TEST_TIMEOUT).unwrap();

        assert!(cache.read("dep-1").await.unwrap().is_none());

        let status = StreamStatus {
            state: StreamState::Connected,
            since: 1_000,
        };
        cache.write("dep-1", status.clone()).await.unwrap();

        let read_back = cache.read("dep-1").await.unwrap().unwrap();
        assert_eq!(read_back.state, status.state);
        assert_eq!(read_back.since, status.since);
    }

    #[tokio::test]
    async fn read_is_scoped_to_its_own_key() {
        let (url, _node) = setup_redis().await;
        let cache = RedisHealthCache::new(&url, TEST_TIMEOUT).unwrap();

        cache
            .write(
                "dep-1",
                StreamStatus {
                    state: StreamState::Disconnected,
                    since: 5,
                },
            )
            .await
            .unwrap();

        assert!(cache.read("dep-2").await.unwrap().is_none());
    }
}
