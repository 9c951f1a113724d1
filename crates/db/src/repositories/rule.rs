use brokerflow_core::chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use brokerflow_core::domain::rule::{
    AutomationRule, NewAutomationRule, RuleId, RulePriority, RuleUpdate, TriggerType,
};

use super::{RepositoryError, RuleRepository};
use crate::DbPool;

pub struct SqlRuleRepository {
    pool: DbPool,
}

impl SqlRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const RULE_COLUMNS: &str = "id,
                name,
                description,
                trigger_type,
                conditions,
                actions,
                enabled,
                priority,
                created_at,
                last_triggered,
                trigger_count,
                deleted_at";

#[async_trait::async_trait]
impl RuleRepository for SqlRuleRepository {
    async fn create(&self, rule: NewAutomationRule) -> Result<AutomationRule, RepositoryError> {
        let now = Utc::now();
        let stored = AutomationRule {
            id: RuleId(Uuid::new_v4().to_string()),
            name: rule.name,
            description: rule.description,
            trigger_type: rule.trigger_type,
            conditions: rule.conditions,
            actions: rule.actions,
            enabled: rule.enabled,
            priority: rule.priority,
            created_at: now,
            last_triggered: None,
            trigger_count: 0,
            deleted_at: None,
        };

        sqlx::query(
            "INSERT INTO automation_rule (
                id,
                name,
                description,
                trigger_type,
                conditions,
                actions,
                enabled,
                priority,
                created_at,
                last_triggered,
                trigger_count,
                deleted_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 0, NULL)",
        )
        .bind(&stored.id.0)
        .bind(&stored.name)
        .bind(&stored.description)
        .bind(stored.trigger_type.as_str())
        .bind(encode_json("conditions", &stored.conditions)?)
        .bind(encode_json("actions", &stored.actions)?)
        .bind(stored.enabled)
        .bind(stored.priority.as_str())
        .bind(stored.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<AutomationRule>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM automation_rule WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(rule_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<AutomationRule>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM automation_rule ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(rule_from_row).collect()
    }

    async fn list_enabled(&self) -> Result<Vec<AutomationRule>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {RULE_COLUMNS} FROM automation_rule
             WHERE enabled = 1
             ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(rule_from_row).collect()
    }

    async fn update(&self, id: &RuleId, update: RuleUpdate) -> Result<(), RepositoryError> {
        let mut rule = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("automation rule {}", id.0)))?;

        if let Some(name) = update.name {
            rule.name = name;
        }
        if let Some(description) = update.description {
            rule.description = description;
        }
        if let Some(trigger_type) = update.trigger_type {
            rule.trigger_type = trigger_type;
        }
        if let Some(conditions) = update.conditions {
            rule.conditions = conditions;
        }
        if let Some(actions) = update.actions {
            rule.actions = actions;
        }
        if let Some(enabled) = update.enabled {
            rule.enabled = enabled;
        }
        if let Some(priority) = update.priority {
            rule.priority = priority;
        }

        sqlx::query(
            "UPDATE automation_rule SET
                name = ?,
                description = ?,
                trigger_type = ?,
                conditions = ?,
                actions = ?,
                enabled = ?,
                priority = ?
             WHERE id = ?",
        )
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.trigger_type.as_str())
        .bind(encode_json("conditions", &rule.conditions)?)
        .bind(encode_json("actions", &rule.actions)?)
        .bind(rule.enabled)
        .bind(rule.priority.as_str())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_trigger(&self, id: &RuleId) -> Result<(), RepositoryError> {
        // Read-modify-write on purpose: the counter is a soft analytics
        // figure and concurrent increments may lose an update.
        let row = sqlx::query("SELECT trigger_count FROM automation_rule WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("automation rule {}", id.0)))?;
        let current: i64 = row.try_get("trigger_count")?;

        sqlx::query(
            "UPDATE automation_rule SET trigger_count = ?, last_triggered = ? WHERE id = ?",
        )
        .bind(current + 1)
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn soft_delete(&self, id: &RuleId) -> Result<(), RepositoryError> {
        let outcome =
            sqlx::query("UPDATE automation_rule SET enabled = 0, deleted_at = ? WHERE id = ?")
                .bind(Utc::now().to_rfc3339())
                .bind(&id.0)
                .execute(&self.pool)
                .await?;

        if outcome.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("automation rule {}", id.0)));
        }
        Ok(())
    }
}

fn encode_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|error| RepositoryError::Decode(format!("could not encode `{column}`: {error}")))
}

fn rule_from_row(row: SqliteRow) -> Result<AutomationRule, RepositoryError> {
    let trigger_raw = row.try_get::<String, _>("trigger_type")?;
    let trigger_type = TriggerType::parse(&trigger_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown trigger type `{trigger_raw}`"))
    })?;

    let priority_raw = row.try_get::<String, _>("priority")?;
    let priority = RulePriority::parse(&priority_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown priority `{priority_raw}`")))?;

    let conditions_raw = row.try_get::<String, _>("conditions")?;
    let conditions = serde_json::from_str(&conditions_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid conditions: {error}")))?;

    let actions_raw = row.try_get::<String, _>("actions")?;
    let actions = serde_json::from_str(&actions_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid actions: {error}")))?;

    let trigger_count_raw: i64 = row.try_get("trigger_count")?;
    let trigger_count = u64::try_from(trigger_count_raw).map_err(|_| {
        RepositoryError::Decode(format!("negative trigger_count: {trigger_count_raw}"))
    })?;

    Ok(AutomationRule {
        id: RuleId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        trigger_type,
        conditions,
        actions,
        enabled: row.try_get("enabled")?,
        priority,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        last_triggered: parse_optional_timestamp("last_triggered", row.try_get("last_triggered")?)?,
        trigger_count,
        deleted_at: parse_optional_timestamp("deleted_at", row.try_get("deleted_at")?)?,
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}
