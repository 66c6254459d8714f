use std::future::Future;
use std::pin::Pin;

pub mod change_event;
pub mod errors;
pub mod metrics;
pub mod stream_status;

pub use change_event::{ChangeDomain, ChangeEvent, ChangeEventKind};
pub use errors::{EdgeError, EdgeResult, ErrorClass, PublishError, SubscribeError};
pub use metrics::{AggregationKey, Attributes, MetricDatum, MetricRecord, TargetDatum};
pub use stream_status::{StreamState, StreamStatus};

/// Well-known bus topic Replicas publish SDK metrics onto for the Primary to consume.
pub const SDK_METRICS_TOPIC: &str = "sdk_metrics";

/// Well-known bus topic the Primary broadcasts connect/disconnect lifecycle control
/// events on; every Replica subscribes to it.
pub const STREAM_ACTION_TOPIC: &str = "stream_action";

/// Mirrors the teacher's `BackgroundTask` alias: a boxed, pinned future representing
/// one long-lived supervised task.
pub type BackgroundTask = Pin<Box<dyn Future<Output = ()> + Send>>;
