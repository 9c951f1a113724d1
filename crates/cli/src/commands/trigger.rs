use brokerflow_core::chrono::Utc;
use brokerflow_core::domain::event::{EntityType, WorkflowEventInput};

use crate::bootstrap::bootstrap;
use crate::commands::CommandResult;

pub async fn run(
    event_type: &str,
    entity_id: &str,
    entity_type: &str,
    data: &str,
) -> CommandResult {
    let Some(entity_type) = EntityType::parse(entity_type) else {
        return CommandResult::failure(
            "trigger",
            "bad_entity_type",
            format!("unknown entity type `{entity_type}` (expected quote|policy|claim|customer)"),
            2,
        );
    };

    let data: serde_json::Value = match serde_json::from_str(data) {
        Ok(data) => data,
        Err(error) => {
            return CommandResult::failure(
                "trigger",
                "bad_data",
                format!("invalid event data json: {error}"),
                2,
            );
        }
    };

    let app = match bootstrap(Default::default()).await {
        Ok(app) => app,
        Err(error) => {
            return CommandResult::failure("trigger", "bootstrap", error.to_string(), 4);
        }
    };

    app.service
        .ingest_and_wait(WorkflowEventInput {
            event_type: event_type.to_string(),
            entity_id: entity_id.to_string(),
            entity_type,
            data,
            occurred_at: Utc::now(),
        })
        .await;
    app.db_pool.close().await;

    CommandResult::success(
        "trigger",
        format!("ingested {event_type} event for {} {entity_id}", entity_type.as_str()),
    )
}
