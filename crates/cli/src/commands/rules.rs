use std::path::Path;

use brokerflow_core::config::{AppConfig, LoadOptions};
use brokerflow_core::domain::rule::{NewAutomationRule, RuleId};
use brokerflow_db::repositories::RuleRepository;
use brokerflow_db::{connect_with_settings, migrations, DbPool, SqlRuleRepository};

use crate::commands::CommandResult;

async fn open_pool(command: &str) -> Result<DbPool, CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| CommandResult::failure(command, "db_connectivity", error.to_string(), 4))?;

    if let Err(error) = migrations::run_pending(&pool).await {
        pool.close().await;
        return Err(CommandResult::failure(command, "migration", error.to_string(), 5));
    }

    Ok(pool)
}

pub async fn list() -> CommandResult {
    let pool = match open_pool("rules.list").await {
        Ok(pool) => pool,
        Err(failure) => return failure,
    };

    let repo = SqlRuleRepository::new(pool.clone());
    let result = repo.list_all().await;
    pool.close().await;

    match result {
        Ok(rules) => match serde_json::to_string_pretty(&rules) {
            Ok(output) => CommandResult::raw(output),
            Err(error) => {
                CommandResult::failure("rules.list", "serialization", error.to_string(), 3)
            }
        },
        Err(error) => CommandResult::failure("rules.list", "repository", error.to_string(), 5),
    }
}

pub async fn create(file: &Path) -> CommandResult {
    let raw = match std::fs::read_to_string(file) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "rules.create",
                "read_file",
                format!("could not read `{}`: {error}", file.display()),
                2,
            );
        }
    };

    let rule: NewAutomationRule = match serde_json::from_str(&raw) {
        Ok(rule) => rule,
        Err(error) => {
            return CommandResult::failure(
                "rules.create",
                "parse_rule",
                format!("invalid rule definition: {error}"),
                2,
            );
        }
    };

    if let Err(error) = rule.validate() {
        return CommandResult::failure("rules.create", "rule_validation", error.to_string(), 2);
    }

    let pool = match open_pool("rules.create").await {
        Ok(pool) => pool,
        Err(failure) => return failure,
    };

    let repo = SqlRuleRepository::new(pool.clone());
    let result = repo.create(rule).await;
    pool.close().await;

    match result {
        Ok(created) => {
            CommandResult::success("rules.create", format!("created rule {}", created.id.0))
        }
        Err(error) => CommandResult::failure("rules.create", "repository", error.to_string(), 5),
    }
}

pub async fn disable(id: &str) -> CommandResult {
    let pool = match open_pool("rules.disable").await {
        Ok(pool) => pool,
        Err(failure) => return failure,
    };

    let repo = SqlRuleRepository::new(pool.clone());
    let result = repo.soft_delete(&RuleId(id.to_string())).await;
    pool.close().await;

    match result {
        Ok(()) => CommandResult::success("rules.disable", format!("disabled rule {id}")),
        Err(error) => CommandResult::failure("rules.disable", "repository", error.to_string(), 5),
    }
}
