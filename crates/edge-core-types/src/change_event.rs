use serde::{Deserialize, Serialize};

/// The two domains ChangeForwarder actually cares about forwarding; everything else
/// passes through SSEIngestor's handler chain untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDomain {
    Feature,
    Segment,
    Disconnect,
    Connect,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEventKind {
    Patch,
    StreamAction,
    EnvironmentRemoved,
    ApikeyRemoved,
    #[serde(other)]
    Other,
}

/// The change event carried on the upstream SSE connection and republished onto the
/// inter-proxy bus. `version` is monotonic per domain+identifier on the SaaS side but
/// this core does not enforce ordering on it (see design notes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event: ChangeEventKind,
    pub domain: ChangeDomain,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(rename = "apiKey", default)]
    pub api_key: Option<String>,
}

impl ChangeEvent {
    pub fn stream_action(domain: ChangeDomain) -> Self {
        ChangeEvent {
            event: ChangeEventKind::StreamAction,
            domain,
            identifier: None,
            version: None,
            environment: None,
            environments: Vec::new(),
            api_key: None,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(
            self.event,
            ChangeEventKind::EnvironmentRemoved | ChangeEventKind::ApikeyRemoved
        )
    }

    pub fn should_forward(&self) -> bool {
        matches!(self.domain, ChangeDomain::Feature | ChangeDomain::Segment) || self.is_removal()
    }
}
