pub mod control;
pub mod poller;
pub mod primary;
pub mod registry;
pub mod replica;

pub use control::ReplicaControlHandler;
pub use poller::SaasPoller;
pub use primary::PrimaryLifecycle;
pub use registry::OpenTopicRegistry;
pub use replica::ReplicaLifecycle;
