use serde_json::json;

use brokerflow_core::config::{AppConfig, LoadOptions, LogFormat};

use crate::commands::CommandResult;

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let rendered = json!({
        "database": {
            "url": config.database.url,
            "max_connections": config.database.max_connections,
            "timeout_secs": config.database.timeout_secs,
        },
        "llm": {
            "api_key": config.llm.api_key.as_ref().map(|_| "***redacted***"),
            "base_url": config.llm.base_url,
            "model": config.llm.model,
            "timeout_secs": config.llm.timeout_secs,
        },
        "sweeps": {
            "expiring_policies_interval_secs": config.sweeps.expiring_policies_interval_secs,
            "overdue_payments_interval_secs": config.sweeps.overdue_payments_interval_secs,
            "stale_claims_interval_secs": config.sweeps.stale_claims_interval_secs,
            "policy_expiry_lookahead_days": config.sweeps.policy_expiry_lookahead_days,
            "stale_claim_age_hours": config.sweeps.stale_claim_age_hours,
        },
        "logging": {
            "level": config.logging.level,
            "format": match config.logging.format {
                LogFormat::Compact => "compact",
                LogFormat::Pretty => "pretty",
                LogFormat::Json => "json",
            },
        },
    });

    match serde_json::to_string_pretty(&rendered) {
        Ok(output) => CommandResult::raw(output),
        Err(error) => CommandResult::failure("config", "serialization", error.to_string(), 3),
    }
}
