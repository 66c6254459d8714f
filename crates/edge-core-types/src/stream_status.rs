use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    Initializing,
    Connected,
    Disconnected,
}

/// `since` is only ever updated when `state` changes, never on a no-op set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatus {
    pub state: StreamState,
    pub since: i64,
}

impl StreamStatus {
    pub fn initializing(now: i64) -> Self {
        StreamStatus {
            state: StreamState::Initializing,
            since: now,
        }
    }
}
