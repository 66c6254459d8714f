pub mod builder;
pub mod config;

pub use builder::{PrimaryRuntime, ReplicaRuntime, RuntimeBuilder, SharedRuntime};
pub use config::{RuntimeConfig, RuntimeConfigBuilder};
