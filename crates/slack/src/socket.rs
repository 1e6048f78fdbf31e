use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use crate::client::ClientError;
use crate::events::{DispatchError, EventContext, EventDispatcher, SlackEnvelope, SlackEvent};

pub const CONNECTIONS_OPEN_URL: &str = "https://slack.com/api/apps.connections.open";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Debug, Error)]
pub enum SocketError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopSocketTransport;

#[async_trait]
impl SocketTransport for NoopSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _envelope_id: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode transport over `apps.connections.open` and a WebSocket.
pub struct SocketModeTransport {
    app_token: SecretString,
    http: Client,
    connections_open_url: String,
    stream: Mutex<Option<WsStream>>,
}

impl SocketModeTransport {
    pub fn new(app_token: SecretString) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            app_token,
            http,
            connections_open_url: CONNECTIONS_OPEN_URL.to_string(),
            stream: Mutex::new(None),
        })
    }

    async fn request_websocket_url(&self) -> Result<String, TransportError> {
        #[derive(Debug, Deserialize)]
        struct ConnectionsOpenResponse {
            ok: bool,
            url: Option<String>,
            error: Option<String>,
        }

        let response = self
            .http
            .post(&self.connections_open_url)
            .bearer_auth(self.app_token.expose_secret())
            .send()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        let payload: ConnectionsOpenResponse = response
            .json()
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        if !payload.ok {
            return Err(TransportError::Connect(
                payload.error.unwrap_or_else(|| "unknown apps.connections.open error".to_string()),
            ));
        }

        payload
            .url
            .ok_or_else(|| TransportError::Connect("no websocket url returned".to_string()))
    }
}

#[async_trait]
impl SocketTransport for SocketModeTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let ws_url = self.request_websocket_url().await?;

        let (ws_stream, _) = connect_async(&ws_url)
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;

        *self.stream.lock().await = Some(ws_stream);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Receive("socket is not connected".to_string()))?;

        loop {
            let Some(message) = stream.next().await else {
                return Ok(None);
            };

            match message {
                Ok(WsMessage::Text(text)) => {
                    debug!(
                        event_name = "ingress.slack.frame_received",
                        payload = %text,
                        "received socket mode frame"
                    );
                    match decode_frame(&text) {
                        FrameDecision::Deliver(envelope) => return Ok(Some(envelope)),
                        FrameDecision::Ignore => continue,
                        FrameDecision::Refresh => {
                            return Err(TransportError::Receive(
                                "server requested connection refresh".to_string(),
                            ))
                        }
                    }
                }
                Ok(WsMessage::Close(_)) => return Ok(None),
                Ok(_) => continue,
                Err(error) => return Err(TransportError::Receive(error.to_string())),
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("socket is not connected".to_string()))?;

        let ack = serde_json::json!({ "envelope_id": envelope_id }).to_string();
        stream
            .send(WsMessage::Text(ack.into()))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            stream
                .close(None)
                .await
                .map_err(|error| TransportError::Disconnect(error.to_string()))?;
        }
        Ok(())
    }
}

enum FrameDecision {
    Deliver(SlackEnvelope),
    Ignore,
    Refresh,
}

/// Decode one socket-mode frame.
///
/// Undecodable frames and malformed event payloads are logged and skipped
/// so one bad frame never tears down the stream.
fn decode_frame(text: &str) -> FrameDecision {
    #[derive(Debug, Deserialize)]
    struct SocketFrame {
        #[serde(rename = "type")]
        frame_type: String,
        envelope_id: Option<String>,
        payload: Option<serde_json::Value>,
    }

    let frame: SocketFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(error) => {
            warn!(error = %error, "undecodable socket mode frame; skipping");
            return FrameDecision::Ignore;
        }
    };

    match frame.frame_type.as_str() {
        "hello" => {
            info!("socket mode handshake complete");
            FrameDecision::Ignore
        }
        "disconnect" => FrameDecision::Refresh,
        "events_api" => {
            let Some(envelope_id) = frame.envelope_id else {
                warn!("events_api frame without envelope id; skipping");
                return FrameDecision::Ignore;
            };

            let event_payload = frame.payload.as_ref().and_then(|payload| payload.get("event"));
            let Some(event_payload) = event_payload else {
                warn!(envelope_id = %envelope_id, "events_api frame without event payload; skipping");
                return FrameDecision::Ignore;
            };

            match SlackEvent::from_payload(event_payload) {
                Ok(event) => FrameDecision::Deliver(SlackEnvelope { envelope_id, event }),
                Err(error) => {
                    warn!(
                        envelope_id = %envelope_id,
                        error = %error,
                        body = %event_payload,
                        "malformed event payload; skipping"
                    );
                    FrameDecision::Ignore
                }
            }
        }
        other => match frame.envelope_id {
            // Unknown envelope kinds still need an ack, so they are delivered
            // as unsupported and ignored by the dispatcher.
            Some(envelope_id) => FrameDecision::Deliver(SlackEnvelope {
                envelope_id,
                event: SlackEvent::Unsupported { event_type: other.to_string() },
            }),
            None => FrameDecision::Ignore,
        },
    }
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "socket mode transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "socket mode retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening socket mode transport connection");
        self.transport.connect().await?;
        info!(attempt, "socket mode transport connected");

        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                info!(attempt, "socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            debug!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                "received slack envelope"
            );

            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    envelope_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            }

            let context = EventContext { correlation_id: envelope.envelope_id.clone() };
            if let Err(error) = self.dispatcher.dispatch(&envelope, &context).await {
                // Global error hook: full failure detail plus the original
                // body, then keep serving events.
                error!(
                    event_name = "ingress.slack.handler_failed",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    body = ?envelope,
                    "event handler failed; continuing socket loop"
                );
            }
        }
    }
}
