use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const SLACK_API_BASE_URL: &str = "https://slack.com/api";

/// Application-level acknowledgement of an outbound send.
///
/// `ok == false` means Slack accepted the request but rejected the message
/// (unknown channel, revoked scope, ...). Callers branch on this instead of
/// catching exceptions; the cause is reported but never acted on differently.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendAck {
    pub ok: bool,
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("chat client construction failed: {0}")]
    Build(#[source] reqwest::Error),
    #[error("slack web api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack web api response could not be decoded: {0}")]
    Decode(String),
}

/// Outbound send capability, shared by the event handlers and the announcer.
///
/// Implementations must be safe to invoke concurrently from both contexts.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<SendAck, ClientError>;

    /// Shortcut bound to the channel the triggering event arrived on.
    async fn reply(&self, event_channel: &str, text: &str) -> Result<SendAck, ClientError> {
        self.post_message(event_channel, text).await
    }
}

/// `ChatClient` over the Slack Web API.
#[derive(Clone)]
pub struct SlackApiClient {
    http: Client,
    bot_token: SecretString,
    base_url: String,
}

impl SlackApiClient {
    pub fn new(bot_token: SecretString) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self { http, bot_token, base_url: SLACK_API_BASE_URL.to_string() })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl ChatClient for SlackApiClient {
    async fn post_message(&self, channel: &str, text: &str) -> Result<SendAck, ClientError> {
        let url = format!("{}/chat.postMessage", self.base_url);

        debug!(event_name = "egress.slack.post_message", channel, "posting message");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.bot_token.expose_secret())
            .json(&PostMessageRequest { channel, text })
            .send()
            .await?;

        let payload: PostMessageResponse =
            response.json().await.map_err(|error| ClientError::Decode(error.to_string()))?;

        Ok(SendAck { ok: payload.ok, error: payload.error })
    }
}
