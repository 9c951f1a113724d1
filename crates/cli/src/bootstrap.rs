use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use brokerflow_ai::HttpTextGenerator;
use brokerflow_core::config::{AppConfig, ConfigError, LoadOptions};
use brokerflow_db::{
    connect_with_settings, migrations, DbPool, SqlDocumentStore, SqlEventRepository,
    SqlRuleRepository,
};
use brokerflow_engine::AutomationService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: AutomationService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("generated-text client setup failed: {0}")]
    Generator(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let store = Arc::new(SqlDocumentStore::new(db_pool.clone()));
    let rules = Arc::new(SqlRuleRepository::new(db_pool.clone()));
    let events = Arc::new(SqlEventRepository::new(db_pool.clone()));
    let generator = Arc::new(
        HttpTextGenerator::from_config(&config.llm).map_err(BootstrapError::Generator)?,
    );

    let service =
        AutomationService::new(store, rules, events, generator, config.sweeps.clone());

    Ok(Application { config, db_pool, service })
}
