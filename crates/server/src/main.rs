mod bootstrap;
mod health;

use anyhow::Result;
use nudge_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use nudge_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    // Now bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config)?;
    let bootstrap::Application { config, slack_runner, announcer } = app;

    health::spawn(
        &config.server.bind_address,
        config.server.health_check_port,
        announcer.schedule().clone(),
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        schedule = %announcer.schedule(),
        announcer_channel = %config.announcer.channel,
        "nudge-server started"
    );

    // The announcer runs on its own timer task for the rest of the process
    // lifetime; the socket runner serves inbound events on this one.
    let _announcer_handle = announcer.start();

    tokio::select! {
        result = slack_runner.start() => {
            result?;
            tracing::info!(
                event_name = "system.server.socket_finished",
                correlation_id = "shutdown",
                "socket runner finished"
            );
        }
        _ = wait_for_shutdown() => {}
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "nudge-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
