pub mod aggregator;
pub mod queue;

pub use aggregator::MetricsAggregator;
pub use queue::{MetricsQueue, MetricsSnapshot, QueuedBatch};
