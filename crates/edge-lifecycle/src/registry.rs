use dashmap::DashSet;

/// Tracks which SDK fan-out topics currently have at least one live subscriber, so
/// the orchestrator knows what to close when the upstream connection degrades.
#[derive(Default)]
pub struct OpenTopicRegistry {
    topics: DashSet<String>,
}

impl OpenTopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, topic: &str) {
        self.topics.insert(topic.to_string());
    }

    pub fn unregister(&self, topic: &str) {
        self.topics.remove(topic);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.topics.iter().map(|t| t.clone()).collect()
    }
}
