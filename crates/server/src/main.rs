mod booking;
mod bootstrap;
mod chat;
mod error;
mod estimate;
mod health;

use std::time::Duration;

use anyhow::Result;
use leadline_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use leadline_core::config::LogFormat::*;
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
    // Logging must be up before bootstrap emits anything.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "leadline-server listening"
    );

    axum::serve(listener, app.router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "leadline-server stopping"
    );
    let drain = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    if tokio::time::timeout(drain, app.db_pool.close()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            "database pool did not close before the drain timeout"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for ctrl-c"
        );
    }
}
