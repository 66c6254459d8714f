pub mod durable;
pub mod traits;
pub mod transient;

pub use durable::RedisDurableBus;
pub use traits::{DurableBus, FanOutBus, MessageHandler};
pub use transient::{FanOutMessage, InMemoryFanOutBus};
