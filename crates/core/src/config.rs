use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub sweeps: SweepConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Cadence and thresholds for the periodic sweeps.
#[derive(Clone, Debug)]
pub struct SweepConfig {
    pub expiring_policies_interval_secs: u64,
    pub overdue_payments_interval_secs: u64,
    pub stale_claims_interval_secs: u64,
    pub policy_expiry_lookahead_days: i64,
    pub stale_claim_age_hours: i64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://brokerflow.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.groq.com/openai/v1".to_string(),
                model: "llama3-8b-8192".to_string(),
                timeout_secs: 30,
            },
            sweeps: SweepConfig {
                expiring_policies_interval_secs: 24 * 60 * 60,
                overdue_payments_interval_secs: 24 * 60 * 60,
                stale_claims_interval_secs: 60 * 60,
                policy_expiry_lookahead_days: 30,
                stale_claim_age_hours: 24,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    sweeps: Option<SweepPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SweepPatch {
    expiring_policies_interval_secs: Option<u64>,
    overdue_payments_interval_secs: Option<u64>,
    stale_claims_interval_secs: Option<u64>,
    policy_expiry_lookahead_days: Option<i64>,
    stale_claim_age_hours: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("brokerflow.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(sweeps) = patch.sweeps {
            if let Some(value) = sweeps.expiring_policies_interval_secs {
                self.sweeps.expiring_policies_interval_secs = value;
            }
            if let Some(value) = sweeps.overdue_payments_interval_secs {
                self.sweeps.overdue_payments_interval_secs = value;
            }
            if let Some(value) = sweeps.stale_claims_interval_secs {
                self.sweeps.stale_claims_interval_secs = value;
            }
            if let Some(value) = sweeps.policy_expiry_lookahead_days {
                self.sweeps.policy_expiry_lookahead_days = value;
            }
            if let Some(value) = sweeps.stale_claim_age_hours {
                self.sweeps.stale_claim_age_hours = value;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BROKERFLOW_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("BROKERFLOW_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("BROKERFLOW_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("BROKERFLOW_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("BROKERFLOW_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BROKERFLOW_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("BROKERFLOW_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("BROKERFLOW_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("BROKERFLOW_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("BROKERFLOW_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BROKERFLOW_LOGGING_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("BROKERFLOW_LOGGING_FORMAT") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(api_key.into());
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = base_url;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("llm.base_url must not be empty".to_string()));
        }
        if self.sweeps.policy_expiry_lookahead_days < 1 {
            return Err(ConfigError::Validation(
                "sweeps.policy_expiry_lookahead_days must be at least 1".to_string(),
            ));
        }
        if self.sweeps.stale_claim_age_hours < 1 {
            return Err(ConfigError::Validation(
                "sweeps.stale_claim_age_hours must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("sweeps.expiring_policies_interval_secs", self.sweeps.expiring_policies_interval_secs),
            ("sweeps.overdue_payments_interval_secs", self.sweeps.overdue_payments_interval_secs),
            ("sweeps.stale_claims_interval_secs", self.sweeps.stale_claims_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }
}

fn resolve_config_path(requested: Option<&Path>) -> Option<PathBuf> {
    match requested {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => {
            let default = PathBuf::from("brokerflow.toml");
            default.exists().then_some(default)
        }
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}
