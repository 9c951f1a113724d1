//! Process-level façade over the automation engine.

use std::sync::Arc;

use brokerflow_core::chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use brokerflow_ai::TextGenerator;
use brokerflow_core::config::SweepConfig;
use brokerflow_core::domain::event::{EntityType, WorkflowEventInput};
use brokerflow_core::domain::rule::{
    AutomationRule, NewAutomationRule, RuleId, RuleUpdate, RuleValidationError,
};
use brokerflow_db::repositories::{EventRepository, RepositoryError, RuleRepository};
use brokerflow_db::DocumentStore;

use crate::actions::ActionExecutor;
use crate::orchestrator::AutomationOrchestrator;
use crate::queue::spawn_ingest_worker;
use crate::sweeps::PeriodicSweepScheduler;
use crate::watchers::ChangeSubscriptionManager;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] RuleValidationError),
    #[error("persistence failure: {0}")]
    Repository(#[from] RepositoryError),
}

/// Owns the whole engine: orchestrator, ingest worker, change
/// subscriptions, sweep timers. Construct one per process and pass it by
/// reference to whatever composes the application.
pub struct AutomationService {
    store: Arc<dyn DocumentStore>,
    rules: Arc<dyn RuleRepository>,
    orchestrator: Arc<AutomationOrchestrator>,
    sweep_config: SweepConfig,
    watchers: Option<ChangeSubscriptionManager>,
    sweeps: Option<PeriodicSweepScheduler>,
    worker: Option<JoinHandle<()>>,
}

impl AutomationService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        rules: Arc<dyn RuleRepository>,
        events: Arc<dyn EventRepository>,
        generator: Arc<dyn TextGenerator>,
        sweep_config: SweepConfig,
    ) -> Self {
        let executor = ActionExecutor::new(store.clone(), generator);
        let orchestrator =
            Arc::new(AutomationOrchestrator::new(rules.clone(), events, executor));

        Self {
            store,
            rules,
            orchestrator,
            sweep_config,
            watchers: None,
            sweeps: None,
            worker: None,
        }
    }

    /// Start the ingest worker, change subscriptions, and sweep timers.
    /// Calling twice is a no-op.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }

        let (ingest, worker) = spawn_ingest_worker(self.orchestrator.clone());
        self.worker = Some(worker);

        let mut watchers = ChangeSubscriptionManager::new(self.store.clone(), ingest.clone());
        watchers.start();
        self.watchers = Some(watchers);

        let mut sweeps =
            PeriodicSweepScheduler::new(self.store.clone(), ingest, self.sweep_config.clone());
        sweeps.start();
        self.sweeps = Some(sweeps);

        info!("automation service started");
    }

    /// Tear down the producers. Already-ingested events keep processing;
    /// the ingest worker drains and exits once every producer handle is
    /// gone. Idempotent and safe before `start()`.
    pub fn stop(&mut self) {
        if let Some(mut watchers) = self.watchers.take() {
            watchers.stop();
        }
        if let Some(mut sweeps) = self.sweeps.take() {
            sweeps.stop();
        }
        self.worker = None;
        info!("automation service stopped");
    }

    /// Manual trigger: synthesize and ingest an event exactly as a watcher
    /// or sweep would. Fire-and-forget.
    pub fn trigger_automation(
        &self,
        event_type: impl Into<String>,
        entity_id: impl Into<String>,
        entity_type: EntityType,
        data: Value,
    ) {
        let input = WorkflowEventInput {
            event_type: event_type.into(),
            entity_id: entity_id.into(),
            entity_type,
            data,
            occurred_at: Utc::now(),
        };
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.ingest(input).await;
        });
    }

    /// Ingest an event and wait for the pipeline to finish. For callers
    /// that need completion (CLI, tests) rather than fire-and-forget.
    pub async fn ingest_and_wait(&self, input: WorkflowEventInput) {
        self.orchestrator.ingest(input).await;
    }

    pub async fn create_rule(
        &self,
        rule: NewAutomationRule,
    ) -> Result<AutomationRule, ServiceError> {
        rule.validate()?;
        Ok(self.rules.create(rule).await?)
    }

    pub async fn list_rules(&self) -> Result<Vec<AutomationRule>, ServiceError> {
        Ok(self.rules.list_all().await?)
    }

    pub async fn update_rule(&self, id: &RuleId, update: RuleUpdate) -> Result<(), ServiceError> {
        Ok(self.rules.update(id, update).await?)
    }

    /// Soft delete: the rule is disabled and stamped, never removed.
    pub async fn delete_rule(&self, id: &RuleId) -> Result<(), ServiceError> {
        Ok(self.rules.soft_delete(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use brokerflow_ai::CannedTextGenerator;
    use brokerflow_core::config::SweepConfig;
    use brokerflow_core::domain::event::EntityType;
    use brokerflow_core::domain::rule::{
        AutomationAction, NewAutomationRule, NotifyBrokerParams, RulePriority, RuleUpdate,
        TriggerType,
    };
    use brokerflow_db::{
        DocumentStore, InMemoryDocumentStore, InMemoryEventRepository, InMemoryRuleRepository,
    };

    use super::{AutomationService, ServiceError};

    fn sweep_config() -> SweepConfig {
        SweepConfig {
            expiring_policies_interval_secs: 3600,
            overdue_payments_interval_secs: 3600,
            stale_claims_interval_secs: 3600,
            policy_expiry_lookahead_days: 30,
            stale_claim_age_hours: 24,
        }
    }

    fn service_with_store() -> (AutomationService, Arc<InMemoryDocumentStore>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service = AutomationService::new(
            store.clone(),
            Arc::new(InMemoryRuleRepository::new()),
            Arc::new(InMemoryEventRepository::new()),
            Arc::new(CannedTextGenerator::default()),
            sweep_config(),
        );
        (service, store)
    }

    #[tokio::test]
    async fn create_rule_validates_before_persisting() {
        let (service, _store) = service_with_store();

        let error = service
            .create_rule(NewAutomationRule {
                name: String::new(),
                description: String::new(),
                trigger_type: TriggerType::ClaimSubmitted,
                conditions: Vec::new(),
                actions: Vec::new(),
                enabled: true,
                priority: RulePriority::Low,
            })
            .await
            .expect_err("empty name must be rejected");
        assert!(matches!(error, ServiceError::Validation(_)));

        assert!(service.list_rules().await.expect("list rules").is_empty());
    }

    #[tokio::test]
    async fn rule_lifecycle_create_update_soft_delete() {
        let (service, _store) = service_with_store();

        let created = service
            .create_rule(NewAutomationRule {
                name: "Notify on claim".to_string(),
                description: String::new(),
                trigger_type: TriggerType::ClaimSubmitted,
                conditions: Vec::new(),
                actions: vec![AutomationAction::NotifyBroker(NotifyBrokerParams {
                    title: None,
                    message: None,
                    priority: None,
                    broker_id: "B1".to_string(),
                })],
                enabled: true,
                priority: RulePriority::Medium,
            })
            .await
            .expect("create rule");

        service
            .update_rule(
                &created.id,
                RuleUpdate { name: Some("Renamed".to_string()), ..RuleUpdate::default() },
            )
            .await
            .expect("update rule");

        service.delete_rule(&created.id).await.expect("soft delete");

        let rules = service.list_rules().await.expect("list rules");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "Renamed");
        assert!(!rules[0].enabled);
        assert!(rules[0].deleted_at.is_some());
    }

    #[tokio::test]
    async fn manual_trigger_flows_through_the_pipeline() {
        let (mut service, store) = service_with_store();
        service.start();

        service
            .create_rule(NewAutomationRule {
                name: "Notify on claim".to_string(),
                description: String::new(),
                trigger_type: TriggerType::ClaimSubmitted,
                conditions: Vec::new(),
                actions: vec![AutomationAction::NotifyBroker(NotifyBrokerParams {
                    title: None,
                    message: None,
                    priority: None,
                    broker_id: "B1".to_string(),
                })],
                enabled: true,
                priority: RulePriority::Medium,
            })
            .await
            .expect("create rule");

        service.trigger_automation(
            "claim_updated",
            "C1",
            EntityType::Claim,
            json!({"status": "submitted"}),
        );

        let mut notifications = Vec::new();
        for _ in 0..100 {
            notifications = store.query("notifications", &[]).await.expect("query notifications");
            if !notifications.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].data["entityId"], "C1");

        service.stop();
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let (mut service, _store) = service_with_store();
        service.stop();
        service.start();
        service.start();
        service.stop();
        service.stop();
        service.start();
        service.stop();
    }
}
