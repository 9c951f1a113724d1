use std::process::ExitCode;

use brokerflow_core::config::{AppConfig, LoadOptions};

use crate::bootstrap;

fn init_logging(config: &AppConfig) {
    use brokerflow_core::config::LogFormat::*;
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

pub async fn run() -> ExitCode {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("configuration issue: {error}");
            return ExitCode::from(2);
        }
    };
    init_logging(&config);

    let mut app = match bootstrap::bootstrap_with_config(config).await {
        Ok(app) => app,
        Err(error) => {
            tracing::error!(error = %error, "bootstrap failed");
            return ExitCode::from(4);
        }
    };

    app.service.start();
    tracing::info!(event_name = "system.run.started", "brokerflow automation runtime started");

    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "failed to listen for shutdown signal");
    }

    tracing::info!(event_name = "system.run.stopping", "brokerflow automation runtime stopping");
    app.service.stop();
    app.db_pool.close().await;

    ExitCode::SUCCESS
}
