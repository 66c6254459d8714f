pub mod handler;
pub mod ingestor;
pub mod observer;

pub use handler::ChangeEventHandler;
pub use ingestor::{SseIngestor, SseIngestorConfig};
pub use observer::{ConnectionObserver, NoopObserver};
