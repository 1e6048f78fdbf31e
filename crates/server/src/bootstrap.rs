use std::sync::Arc;

use nudge_core::config::{AppConfig, ConfigError, LoadOptions};
use nudge_schedule::{Announcer, ScheduleError, ScheduleSpec};
use nudge_slack::client::{ClientError, SlackApiClient};
use nudge_slack::handlers::default_dispatcher;
use nudge_slack::socket::{ReconnectPolicy, SocketModeRunner, SocketModeTransport};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub slack_runner: SocketModeRunner,
    pub announcer: Announcer,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("chat client construction failed: {0}")]
    Client(#[source] ClientError),
    #[error("announcer schedule is invalid: {0}")]
    Schedule(#[source] ScheduleError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

/// Wire the process graph: one outbound client handle, shared by the event
/// dispatcher and the announcer. Any failure here is fatal to startup.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let client = Arc::new(
        SlackApiClient::new(config.slack.bot_token.clone()).map_err(BootstrapError::Client)?,
    );

    let dispatcher = default_dispatcher(client.clone());
    let transport = Arc::new(
        SocketModeTransport::new(config.slack.app_token.clone())
            .map_err(BootstrapError::Client)?,
    );
    let slack_runner =
        SocketModeRunner::new(transport, dispatcher, ReconnectPolicy::default());

    let spec = ScheduleSpec::from_config(&config.announcer).map_err(BootstrapError::Schedule)?;
    let announcer = Announcer::new(client, config.announcer.channel.clone(), spec);

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        announcer_channel = %config.announcer.channel,
        "application bootstrap complete"
    );

    Ok(Application { config, slack_runner, announcer })
}
