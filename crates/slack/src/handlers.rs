use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::{
    client::ChatClient,
    events::{
        EventContext, EventDispatcher, EventHandler, EventHandlerError, HandlerOutcome,
        SlackEnvelope, SlackEvent, SlackEventType,
    },
};

pub const DIRECT_MESSAGE_CHANNEL_TYPE: &str = "im";

pub fn dm_reminder_text(user: &str) -> String {
    format!(
        "Hi <@{user}>! Just a friendly reminder that it's often beneficial to post questions \
         or discussions in public channels. This allows others to learn from the conversation \
         and contribute their insights. Of course, for sensitive or personal matters, direct \
         messages are still appropriate."
    )
}

pub fn mention_greeting_text(user: &str) -> String {
    format!("Hi there, <@{user}>! I'm here to help. How can I assist you today?")
}

/// Builds the production dispatcher: one handler per subscribed event type,
/// all sharing the same outbound client handle.
pub fn default_dispatcher(client: Arc<dyn ChatClient>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(DmReminderHandler::new(client.clone()));
    dispatcher.register(MentionHandler::new(client));
    dispatcher
}

/// Answers direct messages with the public-channels reminder.
///
/// Only `message` events whose `channel_type` is `im` are acted on; anything
/// else produces zero outbound messages. A failed send is logged and
/// swallowed here - no retry, no propagation.
pub struct DmReminderHandler {
    client: Arc<dyn ChatClient>,
}

impl DmReminderHandler {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventHandler for DmReminderHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerOutcome::Ignored);
        };

        if event.channel_type.as_deref() != Some(DIRECT_MESSAGE_CHANNEL_TYPE) {
            return Ok(HandlerOutcome::Ignored);
        }

        info!(
            event_name = "handler.dm.received",
            correlation_id = %ctx.correlation_id,
            user = %event.user,
            channel = %event.channel,
            "received direct message"
        );

        match self.client.post_message(&event.channel, &dm_reminder_text(&event.user)).await {
            Ok(ack) if ack.ok => Ok(HandlerOutcome::Replied),
            Ok(ack) => {
                error!(
                    event_name = "handler.dm.send_rejected",
                    correlation_id = %ctx.correlation_id,
                    channel = %event.channel,
                    error = ack.error.as_deref().unwrap_or("not acknowledged"),
                    "dm reminder was rejected"
                );
                Ok(HandlerOutcome::Processed)
            }
            Err(error) => {
                error!(
                    event_name = "handler.dm.send_failed",
                    correlation_id = %ctx.correlation_id,
                    channel = %event.channel,
                    error = %error,
                    "dm reminder send failed"
                );
                Ok(HandlerOutcome::Processed)
            }
        }
    }
}

/// Greets users who mention the bot, via the reply shortcut.
///
/// Transport errors propagate so the runner's error hook records them; the
/// shortcut's acknowledgement is otherwise not inspected.
pub struct MentionHandler {
    client: Arc<dyn ChatClient>,
}

impl MentionHandler {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventHandler for MentionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::AppMention
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerOutcome, EventHandlerError> {
        let SlackEvent::AppMention(event) = &envelope.event else {
            return Ok(HandlerOutcome::Ignored);
        };

        info!(
            event_name = "handler.mention.received",
            correlation_id = %ctx.correlation_id,
            user = %event.user,
            channel = %event.channel,
            "received app mention"
        );

        self.client
            .reply(&event.channel, &mention_greeting_text(&event.user))
            .await
            .map_err(|error| EventHandlerError::Reply(error.to_string()))?;

        Ok(HandlerOutcome::Replied)
    }
}
