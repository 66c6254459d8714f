pub mod cache;
pub mod tracker;

pub use cache::{HealthCache, RedisHealthCache};
pub use tracker::StreamHealth;
