use crate::cache::HealthCache;
use edge_core_types::{EdgeResult, StreamState, StreamStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cache-backed, in-memory-authoritative stream health. SDK-stream admission is a
/// hot-path read, so `status()` never blocks on the cache: a cache stall must not
/// drop SDK subscriptions.
pub struct StreamHealth {
    cache_key: String,
    cache: Arc<dyn HealthCache>,
    state: RwLock<StreamStatus>,
    /// What this tracker believes is currently written to the cache. May diverge
    /// from `state` after a failed cache write; `verify` reconciles it.
    believed_cache_state: RwLock<StreamState>,
}

impl StreamHealth {
    pub fn new(cache_key: String, cache: Arc<dyn HealthCache>, now: i64) -> Self {
        Self {
            cache_key,
            cache,
            state: RwLock::new(StreamStatus::initializing(now)),
            believed_cache_state: RwLock::new(StreamState::Initializing),
        }
    }

    async fn set(&self, desired: StreamState, now: i64) -> EdgeResult<()> {
        if *self.believed_cache_state.read().await == desired {
            return Ok(());
        }

        let snapshot = {
            let mut state = self.state.write().await;
            *state = StreamStatus {
                state: desired,
                since: now,
            };
            *state
        };

        match self.cache.write(&self.cache_key, snapshot).await {
            Ok(()) => {
                *self.believed_cache_state.write().await = desired;
                Ok(())
            }
            Err(e) => {
                warn!(
                    "cache write failed for {}, in-memory state is still authoritative: {e}",
                    self.cache_key
                );
                Err(e)
            }
        }
    }

    pub async fn set_healthy(&self, now: i64) -> EdgeResult<()> {
        self.set(StreamState::Connected, now).await
    }

    pub async fn set_unhealthy(&self, now: i64) -> EdgeResult<()> {
        self.set(StreamState::Disconnected, now).await
    }

    pub async fn status(&self) -> StreamStatus {
        *self.state.read().await
    }

    /// Ticks at `interval`; on each tick, if the in-memory state has diverged from
    /// what we believe is cached, re-attempts the cache write. Runs until `cancel`.
    pub async fn verify(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("stream health verification loop cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    let snapshot = *self.state.read().await;
                    let believed = *self.believed_cache_state.read().await;
                    if believed != snapshot.state {
                        match self.cache.write(&self.cache_key, snapshot).await {
                            Ok(()) => *self.believed_cache_state.write().await = snapshot.state,
                            Err(e) => warn!(
                                "verify: cache still unreachable for {}: {e}",
                                self.cache_key
                            ),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FlakyCache {
        fail_writes: AtomicBool,
        writes: AtomicUsize,
        last_written: Mutex<Option<StreamStatus>>,
    }

    impl FlakyCache {
        fn new() -> Self {
            Self {
                fail_writes: AtomicBool::new(false),
                writes: AtomicUsize::new(0),
                last_written: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl HealthCache for FlakyCache {
        async fn write(&self, _key: &str, status: StreamStatus) -> EdgeResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(edge_core_types::EdgeError::CacheError("down".into()));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            *self.last_written.lock().unwrap() = Some(status);
            Ok(())
        }

        async fn read(&self, _key: &str) -> EdgeResult<Option<StreamStatus>> {
            Ok(*self.last_written.lock().unwrap())
        }
    }

    #[tokio::test]
    async fn set_unhealthy_updates_in_memory_even_when_cache_write_fails() {
        let cache = Arc::new(FlakyCache::new());
        cache.fail_writes.store(true, Ordering::SeqCst);
        let health = StreamHealth::new("deployment-1".into(), cache, 0);

        let result = health.set_unhealthy(100).await;
        assert!(result.is_err());
        assert_eq!(health.status().await.state, StreamState::Disconnected);
    }

    #[tokio::test]
    async fn set_healthy_then_status_observes_connected() {
        let cache = Arc::new(FlakyCache::new());
        let health = StreamHealth::new("deployment-1".into(), cache, 0);

        health.set_healthy(50).await.unwrap();
        assert_eq!(health.status().await.state, StreamState::Connected);
    }

    #[tokio::test]
    async fn verify_reconciles_cache_after_outage_clears() {
        let cache = Arc::new(FlakyCache::new());
        cache.fail_writes.store(true, Ordering::SeqCst);
        let health = Arc::new(StreamHealth::new("deployment-1".into(), cache.clone(), 0));

        health.set_unhealthy(10).await.unwrap_err();
        cache.fail_writes.store(false, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let verify_cancel = cancel.clone();
        let verify_health = health.clone();
        let handle = tokio::spawn(async move {
            verify_health
                .verify(Duration::from_millis(20), verify_cancel)
                .await
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        let cached = cache.read("deployment-1").await.unwrap().unwrap();
        assert_eq!(cached.state, StreamState::Disconnected);
    }
}
