use std::time::Duration;

const DEFAULT_SSE_BACKOFF: Duration = Duration::from_secs(60);
const DEFAULT_HEALTH_VERIFY_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_METRICS_FLUSH_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_METRICS_BOUND_BYTES: u64 = 1024 * 1024;
const DEFAULT_STREAM_CAP: usize = 1000;
const DEFAULT_METRICS_CONSUMER_CONCURRENCY: usize = 4;

/// Ambient knobs for the pieces `RuntimeBuilder` wires together. Every field has a
/// sensible default; callers only override what their deployment actually needs.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long SseIngestor waits after a disconnect before reconnecting.
    pub sse_backoff: Duration,
    /// How often StreamHealth::verify reconciles the cache with in-memory state.
    pub health_verify_interval: Duration,
    /// Flush interval for both metrics sub-queues.
    pub metrics_flush_interval: Duration,
    /// Size bound, in bytes, for the evaluation-metrics sub-queue.
    pub metrics_evaluation_bound_bytes: u64,
    /// Size bound, in bytes, for the target-metrics sub-queue.
    pub metrics_target_bound_bytes: u64,
    /// Number of parallel consumer tasks decoding `sdk_metrics` bus messages.
    pub metrics_consumer_concurrency: usize,
    /// Approximate max length of each durable bus stream before it is trimmed.
    pub durable_stream_cap: usize,
    /// Whether per-target analytics are preserved instead of collapsed to the
    /// global sentinel. Defaults to `false` (normalize), matching current
    /// production behavior.
    pub per_target_analytics: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sse_backoff: DEFAULT_SSE_BACKOFF,
            health_verify_interval: DEFAULT_HEALTH_VERIFY_INTERVAL,
            metrics_flush_interval: DEFAULT_METRICS_FLUSH_INTERVAL,
            metrics_evaluation_bound_bytes: DEFAULT_METRICS_BOUND_BYTES,
            metrics_target_bound_bytes: DEFAULT_METRICS_BOUND_BYTES,
            metrics_consumer_concurrency: DEFAULT_METRICS_CONSUMER_CONCURRENCY,
            durable_stream_cap: DEFAULT_STREAM_CAP,
            per_target_analytics: false,
        }
    }
}

pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_sse_backoff(mut self, backoff: Duration) -> Self {
        self.config.sse_backoff = backoff;
        self
    }

    pub fn with_health_verify_interval(mut self, interval: Duration) -> Self {
        self.config.health_verify_interval = interval;
        self
    }

    pub fn with_metrics_flush_interval(mut self, interval: Duration) -> Self {
        self.config.metrics_flush_interval = interval;
        self
    }

    pub fn with_metrics_bounds(mut self, evaluation_bytes: u64, target_bytes: u64) -> Self {
        self.config.metrics_evaluation_bound_bytes = evaluation_bytes;
        self.config.metrics_target_bound_bytes = target_bytes;
        self
    }

    pub fn with_metrics_consumer_concurrency(mut self, concurrency: usize) -> Self {
        self.config.metrics_consumer_concurrency = concurrency;
        self
    }

    pub fn with_durable_stream_cap(mut self, cap: usize) -> Self {
        self.config.durable_stream_cap = cap;
        self
    }

    pub fn with_per_target_analytics(mut self, enabled: bool) -> Self {
        self.config.per_target_analytics = enabled;
        self
    }

    pub fn build(self) -> RuntimeConfig {
        self.config
    }
}

impl Default for RuntimeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
