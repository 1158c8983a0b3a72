//! Bybit Feed Client
//!
//! Maintains the persistent WebSocket connection to a Bybit v5 public
//! stream. Lifecycle: Disconnected -> Connecting -> Subscribed, looping
//! through the reconnect policy on any transport failure, with a terminal
//! ShuttingDown state driven by the cancellation token.
//!
//! While subscribed, every inbound data envelope is resolved against the
//! instrument catalog and appended to the record buffer. Routing failures
//! are logged and dropped; the message is not replayable, so there is no
//! retry.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::messages::{Inbound, OpRequest};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::domain::catalog::InstrumentCatalog;
use crate::domain::routing;
use crate::infrastructure::buffer::RecordBuffer;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the feed client.
///
/// All of these are recovered locally by the reconnect loop; none terminate
/// the process.
#[derive(Debug, thiserror::Error)]
pub enum FeedClientError {
    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Outbound request could not be serialized.
    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The server closed the connection or the stream ended.
    #[error("connection closed")]
    ConnectionClosed,
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// WebSocket endpoint URL, e.g. `wss://stream.bybit.com/v5/public/linear`.
    pub url: String,
    /// Application-level heartbeat interval (`{"op": "ping"}`).
    pub ping_interval: Duration,
    /// Reconnection behavior.
    pub reconnect: ReconnectConfig,
}

impl FeedClientConfig {
    /// Create a configuration with default heartbeat and reconnect settings.
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url,
            ping_interval: Duration::from_secs(20),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// =============================================================================
// Feed Client
// =============================================================================

/// WebSocket client feeding the record buffer.
pub struct FeedClient {
    config: FeedClientConfig,
    catalog: Arc<InstrumentCatalog>,
    buffer: Arc<RecordBuffer>,
    cancel: CancellationToken,
}

impl FeedClient {
    /// Create a new feed client.
    #[must_use]
    pub fn new(
        config: FeedClientConfig,
        catalog: Arc<InstrumentCatalog>,
        buffer: Arc<RecordBuffer>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            catalog,
            buffer,
            cancel,
        }
    }

    /// Run the connection loop until cancelled.
    ///
    /// Transport failures re-enter the connect state after the policy's
    /// delay, indefinitely.
    ///
    /// # Errors
    ///
    /// Currently only returns `Ok(())` on cancellation; the signature leaves
    /// room for unrecoverable setup failures.
    pub async fn run(self: Arc<Self>) -> Result<(), FeedClientError> {
        let mut reconnect_policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("feed client cancelled");
                return Ok(());
            }

            match self.connect_and_run(&mut reconnect_policy).await {
                Ok(()) => {
                    tracing::info!("feed connection closed, shutting down");
                    return Ok(());
                }
                Err(e) => {
                    let delay = reconnect_policy.next_delay();
                    tracing::warn!(
                        error = %e,
                        attempt = reconnect_policy.attempt_count(),
                        delay_ms = delay.as_millis(),
                        "feed connection lost, reconnecting"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("feed client cancelled during reconnect delay");
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Connect, subscribe, and process messages until error or cancellation.
    async fn connect_and_run(
        &self,
        reconnect_policy: &mut ReconnectPolicy,
    ) -> Result<(), FeedClientError> {
        tracing::info!(url = %self.config.url, "connecting to feed");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.config.url).await?;
        let (mut write, mut read) = ws_stream.split();

        // One subscribe request covering every configured topic.
        let subscribe = OpRequest::subscribe(self.catalog.subscription_args());
        let args_len = subscribe.args.len();
        write.send(Message::Text(subscribe.to_json()?.into())).await?;
        tracing::info!(topics = args_len, "subscribed to feed");

        // Connection is up; subsequent failures start the schedule over.
        reconnect_policy.reset();

        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("closing feed connection");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = ping.tick() => {
                    write.send(Message::Text(OpRequest::ping().to_json()?.into())).await?;
                    tracing::debug!("sent heartbeat ping");
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text),
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "server sent close frame");
                            return Err(FeedClientError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {
                            // Pong and binary frames are ignored.
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!("WebSocket stream ended");
                            return Err(FeedClientError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }

    /// Route one text frame into the buffer. Never fails: routing and parse
    /// failures are logged and the message dropped.
    fn handle_text(&self, text: &str) {
        match Inbound::parse(text) {
            Ok(Inbound::Data { topic, message }) => {
                match routing::resolve(&topic, &self.catalog) {
                    Ok(key) => {
                        if let Err(e) = self.buffer.append(&key, message) {
                            tracing::warn!(error = %e, "dropping record for unregistered key");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping unroutable message");
                    }
                }
            }
            Ok(Inbound::Ack(ack)) => {
                if ack.is_failure() {
                    tracing::error!(
                        op = %ack.op,
                        ret_msg = ack.ret_msg.as_deref().unwrap_or(""),
                        "feed rejected request"
                    );
                } else {
                    tracing::debug!(op = %ack.op, "feed acknowledged request");
                }
            }
            Ok(Inbound::Unknown(value)) => {
                tracing::warn!(message = %value, "dropping message without topic");
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping non-JSON message");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::domain::catalog::StreamKey;

    fn client() -> (Arc<FeedClient>, StreamKey) {
        let mut instruments = BTreeMap::new();
        instruments.insert("BTCUSDT".to_string(), vec!["publicTrade".to_string()]);
        let catalog = Arc::new(InstrumentCatalog::new(instruments).unwrap());
        let buffer = Arc::new(RecordBuffer::new(&catalog));
        let client = FeedClient::new(
            FeedClientConfig::new("wss://example.invalid/v5/public/linear".to_string()),
            catalog,
            buffer,
            CancellationToken::new(),
        );
        (Arc::new(client), StreamKey::new("BTCUSDT", "publicTrade"))
    }

    #[test]
    fn data_frame_is_buffered() {
        let (client, key) = client();
        client.handle_text(r#"{"topic":"publicTrade.BTCUSDT","data":[{"p":"1"}]}"#);
        assert_eq!(client.buffer.len(&key), Some(1));

        let drained = client.buffer.drain_all();
        assert_eq!(drained[&key][0]["topic"], json!("publicTrade.BTCUSDT"));
    }

    #[test]
    fn unroutable_topic_leaves_buffer_unmodified() {
        let (client, _) = client();
        client.handle_text(r#"{"topic":"unknown.trade","data":{}}"#);
        assert_eq!(client.buffer.total_len(), 0);
    }

    #[test]
    fn missing_topic_and_garbage_are_dropped() {
        let (client, _) = client();
        client.handle_text(r#"{"data":{}}"#);
        client.handle_text("not json at all");
        client.handle_text(r#"{"success":true,"op":"subscribe"}"#);
        assert_eq!(client.buffer.total_len(), 0);
    }
}
