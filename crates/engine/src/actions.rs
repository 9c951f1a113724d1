//! Side-effect handlers behind automation rules.
//!
//! Every handler is an independent append or patch against the document
//! store; none assumes single invocation, so re-ingesting an event at worst
//! duplicates a record. Unknown action kinds are logged and skipped.

use std::sync::Arc;

use rand::Rng;
use serde_json::json;
use tracing::{info, warn};

use brokerflow_ai::{GenerationOptions, TextGenerator};
use brokerflow_core::domain::event::WorkflowEventInput;
use brokerflow_core::domain::rule::{
    AiReviewParams, AutomationAction, AutomationRule, CreateTaskParams, GenerateDocumentParams,
    NotifyBrokerParams, SendEmailParams, UpdateStatusParams,
};
use brokerflow_core::review::{default_review_prompt, extract_recommendations};
use brokerflow_db::{DocumentStore, StoreError, SERVER_TIMESTAMP};

const REVIEW_TEMPERATURE: f32 = 0.3;
const REVIEW_MAX_TOKENS: u32 = 500;

pub struct ActionExecutor {
    store: Arc<dyn DocumentStore>,
    generator: Arc<dyn TextGenerator>,
}

impl ActionExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { store, generator }
    }

    pub async fn execute(
        &self,
        action: &AutomationAction,
        event: &WorkflowEventInput,
        rule: &AutomationRule,
    ) -> Result<(), StoreError> {
        match action {
            AutomationAction::SendEmail(params) => self.send_email(params, event).await,
            AutomationAction::CreateTask(params) => self.create_task(params, event).await,
            AutomationAction::UpdateStatus(params) => self.update_status(params, event).await,
            AutomationAction::GenerateDocument(params) => {
                self.generate_document(params, event).await
            }
            AutomationAction::AiReview(params) => {
                // Review failures (provider or store) never fail the rule.
                if let Err(error) = self.perform_ai_review(params, event).await {
                    warn!(
                        rule = %rule.name,
                        entity_id = %event.entity_id,
                        error = %error,
                        "ai review failed, skipping"
                    );
                }
                Ok(())
            }
            AutomationAction::NotifyBroker(params) => self.notify_broker(params, event).await,
            AutomationAction::Other(unknown) => {
                warn!(kind = %unknown.kind, rule = %rule.name, "unknown automation action type, skipping");
                Ok(())
            }
        }
    }

    async fn send_email(
        &self,
        params: &SendEmailParams,
        event: &WorkflowEventInput,
    ) -> Result<(), StoreError> {
        self.store
            .add(
                "email_logs",
                json!({
                    "type": "automated",
                    "recipient": params.recipient,
                    "subject": params.subject,
                    "template": params.template,
                    "entityId": event.entity_id,
                    "entityType": event.entity_type.as_str(),
                    "sentAt": SERVER_TIMESTAMP,
                    "status": "sent"
                }),
            )
            .await?;
        info!(recipient = %params.recipient, subject = %params.subject, "recorded automated email");
        Ok(())
    }

    async fn create_task(
        &self,
        params: &CreateTaskParams,
        event: &WorkflowEventInput,
    ) -> Result<(), StoreError> {
        let title = params.title.clone().unwrap_or_else(|| {
            format!("Automated task for {} {}", event.entity_type.as_str(), event.entity_id)
        });
        let description =
            params.description.clone().unwrap_or_else(|| "Task created by automation".to_string());
        let priority = params.priority.as_deref().unwrap_or("medium");

        self.store
            .add(
                "tasks",
                json!({
                    "title": title,
                    "description": description,
                    "priority": priority,
                    "assigneeId": params.assignee_id,
                    "dueDate": params.due_date,
                    "entityId": event.entity_id,
                    "entityType": event.entity_type.as_str(),
                    "status": "pending",
                    "automated": true,
                    "createdAt": SERVER_TIMESTAMP,
                    "updatedAt": SERVER_TIMESTAMP
                }),
            )
            .await?;
        info!(title = %title, "created automated task");
        Ok(())
    }

    async fn update_status(
        &self,
        params: &UpdateStatusParams,
        event: &WorkflowEventInput,
    ) -> Result<(), StoreError> {
        self.store
            .update_fields(
                &params.collection,
                &event.entity_id,
                &[
                    (params.field.clone(), params.value.clone()),
                    ("updatedAt".to_string(), json!(SERVER_TIMESTAMP)),
                    ("automatedUpdate".to_string(), json!(true)),
                ],
            )
            .await?;
        info!(
            collection = %params.collection,
            entity_id = %event.entity_id,
            field = %params.field,
            "applied automated status update"
        );
        Ok(())
    }

    async fn generate_document(
        &self,
        params: &GenerateDocumentParams,
        event: &WorkflowEventInput,
    ) -> Result<(), StoreError> {
        let name = params.name.as_deref().unwrap_or("Automated Document");
        let document_type = params.document_type.as_deref().unwrap_or("generated");

        self.store
            .add(
                "documents",
                json!({
                    "entityId": event.entity_id,
                    "entityType": event.entity_type.as_str(),
                    "template": params.template,
                    "name": name,
                    "type": document_type,
                    "status": "generated",
                    "url": format!("https://docs.example.com/{}/{}.pdf", event.entity_id, params.template),
                    "generatedAt": SERVER_TIMESTAMP,
                    "automated": true
                }),
            )
            .await?;
        info!(template = %params.template, entity_id = %event.entity_id, "recorded generated document");
        Ok(())
    }

    async fn perform_ai_review(
        &self,
        params: &AiReviewParams,
        event: &WorkflowEventInput,
    ) -> Result<(), ReviewError> {
        let prompt = params
            .prompt
            .clone()
            .unwrap_or_else(|| default_review_prompt(event.entity_type, &event.data));

        let response = self
            .generator
            .generate(
                &prompt,
                &GenerationOptions {
                    temperature: REVIEW_TEMPERATURE,
                    max_tokens: REVIEW_MAX_TOKENS,
                },
            )
            .await
            .map_err(ReviewError::Generation)?;

        let recommendations = extract_recommendations(&response);
        let confidence: f64 = rand::thread_rng().gen_range(0.7..1.0);

        self.store
            .add(
                "ai_reviews",
                json!({
                    "entityId": event.entity_id,
                    "entityType": event.entity_type.as_str(),
                    "prompt": prompt,
                    "response": response,
                    "confidence": confidence,
                    "recommendations": recommendations,
                    "reviewedAt": SERVER_TIMESTAMP,
                    "automated": true
                }),
            )
            .await
            .map_err(ReviewError::Store)?;
        info!(entity_id = %event.entity_id, entity_type = %event.entity_type.as_str(), "completed ai review");
        Ok(())
    }

    async fn notify_broker(
        &self,
        params: &NotifyBrokerParams,
        event: &WorkflowEventInput,
    ) -> Result<(), StoreError> {
        let title = params.title.as_deref().unwrap_or("Automation Alert");
        let message = params.message.clone().unwrap_or_else(|| {
            format!("Automated action triggered for {}", event.entity_type.as_str())
        });
        let priority = params.priority.as_deref().unwrap_or("medium");

        self.store
            .add(
                "notifications",
                json!({
                    "type": "automation_alert",
                    "title": title,
                    "message": message,
                    "priority": priority,
                    "entityId": event.entity_id,
                    "entityType": event.entity_type.as_str(),
                    "brokerId": params.broker_id,
                    "read": false,
                    "createdAt": SERVER_TIMESTAMP
                }),
            )
            .await?;
        info!(broker_id = %params.broker_id, title = %title, "sent broker notification");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
enum ReviewError {
    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),
    #[error("store write failed: {0}")]
    Store(#[source] StoreError),
}
