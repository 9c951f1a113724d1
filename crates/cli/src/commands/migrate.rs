use brokerflow_core::config::{AppConfig, LoadOptions};
use brokerflow_db::{connect_with_settings, migrations};

use crate::commands::CommandResult;

pub async fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "migrate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let pool = match connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    {
        Ok(pool) => pool,
        Err(error) => {
            return CommandResult::failure("migrate", "db_connectivity", error.to_string(), 4);
        }
    };

    let result = migrations::run_pending(&pool).await;
    pool.close().await;

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(error) => CommandResult::failure("migrate", "migration", error.to_string(), 5),
    }
}
