use brokerflow_core::chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use brokerflow_core::domain::event::{
    AutomationResult, EntityType, EventId, WorkflowEvent, WorkflowEventInput,
};

use super::rule::{parse_optional_timestamp, parse_timestamp};
use super::{EventRepository, RepositoryError};
use crate::DbPool;

pub struct SqlEventRepository {
    pool: DbPool,
}

impl SqlEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const EVENT_COLUMNS: &str = "id,
                event_type,
                entity_id,
                entity_type,
                data,
                occurred_at,
                processed,
                results,
                processed_at,
                created_at";

#[async_trait::async_trait]
impl EventRepository for SqlEventRepository {
    async fn insert(&self, input: WorkflowEventInput) -> Result<EventId, RepositoryError> {
        let id = EventId(Uuid::new_v4().to_string());

        sqlx::query(
            "INSERT INTO automation_event (
                id,
                event_type,
                entity_id,
                entity_type,
                data,
                occurred_at,
                processed,
                results,
                processed_at,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, 0, NULL, NULL, ?)",
        )
        .bind(&id.0)
        .bind(&input.event_type)
        .bind(&input.entity_id)
        .bind(input.entity_type.as_str())
        .bind(input.data.to_string())
        .bind(input.occurred_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_by_id(&self, id: &EventId) -> Result<Option<WorkflowEvent>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM automation_event WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(event_from_row).transpose()
    }

    async fn list_unprocessed(&self) -> Result<Vec<WorkflowEvent>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM automation_event
             WHERE processed = 0
             ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(event_from_row).collect()
    }

    async fn finalize(
        &self,
        id: &EventId,
        results: &[AutomationResult],
    ) -> Result<(), RepositoryError> {
        let encoded = serde_json::to_string(results)
            .map_err(|error| RepositoryError::Decode(format!("could not encode results: {error}")))?;

        let outcome = sqlx::query(
            "UPDATE automation_event SET results = ?, processed = 1, processed_at = ?
             WHERE id = ?",
        )
        .bind(encoded)
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if outcome.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("automation event {}", id.0)));
        }
        Ok(())
    }
}

fn event_from_row(row: SqliteRow) -> Result<WorkflowEvent, RepositoryError> {
    let entity_raw = row.try_get::<String, _>("entity_type")?;
    let entity_type = EntityType::parse(&entity_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown entity type `{entity_raw}`")))?;

    let data_raw = row.try_get::<String, _>("data")?;
    let data = serde_json::from_str(&data_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid event data: {error}")))?;

    let results = match row.try_get::<Option<String>, _>("results")? {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|error| RepositoryError::Decode(format!("invalid results: {error}")))?,
        None => Vec::new(),
    };

    Ok(WorkflowEvent {
        id: EventId(row.try_get("id")?),
        event_type: row.try_get("event_type")?,
        entity_id: row.try_get("entity_id")?,
        entity_type,
        data,
        occurred_at: parse_timestamp("occurred_at", row.try_get("occurred_at")?)?,
        processed: row.try_get("processed")?,
        results,
        processed_at: parse_optional_timestamp("processed_at", row.try_get("processed_at")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
