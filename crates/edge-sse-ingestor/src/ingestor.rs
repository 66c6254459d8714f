use crate::handler::ChangeEventHandler;
use crate::observer::ConnectionObserver;
use edge_core_types::ChangeEvent;
use eventsource_client::Client;
use futures::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_BACKOFF: Duration = Duration::from_secs(60);

type SseStream =
    Pin<Box<dyn futures::Stream<Item = Result<eventsource_client::SSE, eventsource_client::Error>> + Send>>;

#[derive(Clone)]
pub struct SseIngestorConfig {
    pub streaming_url: String,
    pub bearer_token: String,
    pub api_key: String,
    /// How long to wait after a disconnect before attempting to reconnect. The
    /// underlying SSE client's own reconnection is disabled; this supervisor loop
    /// owns all reconnect timing so `on_connect`/`on_disconnect` always fire.
    pub backoff: Duration,
}

impl SseIngestorConfig {
    pub fn new(streaming_url: String, bearer_token: String, api_key: String) -> Self {
        Self {
            streaming_url,
            bearer_token,
            api_key,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// A single logical subscription to the upstream change-event stream. Reconnects
/// forever until `cancel` fires; never gives up on its own.
pub struct SseIngestor {
    config: SseIngestorConfig,
    handler: Arc<dyn ChangeEventHandler>,
    observer: Arc<dyn ConnectionObserver>,
}

impl SseIngestor {
    pub fn new(
        config: SseIngestorConfig,
        handler: Arc<dyn ChangeEventHandler>,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Self {
        Self {
            config,
            handler,
            observer,
        }
    }

    fn build_stream(&self) -> anyhow::Result<SseStream> {
        let client = eventsource_client::ClientBuilder::for_url(&self.config.streaming_url)?
            .header("Authorization", &format!("Bearer {}", self.config.bearer_token))?
            .header("API-Key", &self.config.api_key)?
            // Reconnect intentionally left disabled: this ingestor's own
            // supervisor loop in `subscribe` owns all reconnect/backoff timing.
            .build();
        Ok(client.stream())
    }

    /// Runs until `cancel` fires. Each iteration: announce connect, read events
    /// until the stream ends or errors, announce disconnect, sleep the configured
    /// backoff, then reconnect.
    pub async fn subscribe(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                return;
            }

            self.observer.on_connect().await;
            self.run_connection(&cancel).await;
            self.observer.on_disconnect().await;

            if cancel.is_cancelled() {
                return;
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.backoff) => {}
            }
        }
    }

    async fn run_connection(&self, cancel: &CancellationToken) {
        let mut stream = match self.build_stream() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to build SSE stream, treating as immediate disconnect");
                return;
            }
        };
        info!("connected to upstream change stream");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                next = stream.next() => {
                    match next {
                        Some(Ok(sse)) => self.handle_sse(sse).await,
                        Some(Err(e)) => {
                            info!(error = %e, "SSE stream error, disconnecting");
                            return;
                        }
                        None => {
                            info!("SSE stream ended, disconnecting");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_sse(&self, sse: eventsource_client::SSE) {
        match sse {
            eventsource_client::SSE::Event(event) => {
                match serde_json::from_str::<ChangeEvent>(&event.data) {
                    Ok(change_event) => {
                        if let Err(e) = self.handler.handle(change_event).await {
                            warn!(error = %e, "change event handler returned an error");
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping undecodable change event");
                    }
                }
            }
            eventsource_client::SSE::Connected(_) => {
                debug!("SSE connection established");
            }
            eventsource_client::SSE::Comment(_) => {}
        }
    }
}
