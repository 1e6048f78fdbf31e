use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    AppMention(AppMentionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::AppMention(_) => SlackEventType::AppMention,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    /// Decode a raw `events_api` payload into a typed event.
    ///
    /// Payloads whose discriminator we subscribe to but whose shape is
    /// malformed (e.g. a mention without a `user`) fail here and surface
    /// through the error hook; handlers never re-validate fields inline.
    pub fn from_payload(payload: &Value) -> Result<Self, EnvelopeParseError> {
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or(EnvelopeParseError::MissingEventType)?;

        match event_type {
            "message" => serde_json::from_value(payload.clone())
                .map(Self::Message)
                .map_err(|source| EnvelopeParseError::malformed("message", source)),
            "app_mention" => serde_json::from_value(payload.clone())
                .map(Self::AppMention)
                .map_err(|source| EnvelopeParseError::malformed("app_mention", source)),
            other => Ok(Self::Unsupported { event_type: other.to_string() }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    AppMention,
    Unsupported,
}

/// Generic `message` event. `channel_type` is `im` for direct messages.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel: String,
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel_type: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AppMentionEvent {
    pub channel: String,
    pub user: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeParseError {
    #[error("event payload is missing its `type` discriminator")]
    MissingEventType,
    #[error("malformed `{event_type}` event: {detail}")]
    MalformedEvent { event_type: String, detail: String },
}

impl EnvelopeParseError {
    fn malformed(event_type: &str, source: serde_json::Error) -> Self {
        Self::MalformedEvent { event_type: event_type.to_string(), detail: source.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The handler issued exactly one outbound message.
    Replied,
    /// The handler ran but produced no (successful) outbound message.
    Processed,
    /// The event did not concern this handler.
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("mention reply failed: {0}")]
    Reply(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, EventHandlerError>;
}

/// Routes each envelope to at most one handler by event type.
///
/// Handlers are registered explicitly at startup; there is no implicit
/// discovery. Events without a registered handler are ignored.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, DispatchError> {
        // Request hook: every envelope is logged before any type-specific
        // handler runs, and nothing is filtered here.
        debug!(
            event_name = "ingress.slack.request_received",
            correlation_id = %ctx.correlation_id,
            body = ?envelope,
            "received request"
        );

        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerOutcome::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}
