//! Event orchestration: persist, match, execute, record.

use std::sync::Arc;

use brokerflow_core::chrono::Utc;
use tracing::{debug, info, warn};

use brokerflow_core::domain::event::{AutomationResult, WorkflowEventInput};
use brokerflow_core::domain::rule::AutomationRule;
use brokerflow_core::{evaluate_conditions, matches_trigger};
use brokerflow_db::repositories::{EventRepository, RepositoryError, RuleRepository};

use crate::actions::ActionExecutor;

pub struct AutomationOrchestrator {
    rules: Arc<dyn RuleRepository>,
    events: Arc<dyn EventRepository>,
    executor: ActionExecutor,
}

impl AutomationOrchestrator {
    pub fn new(
        rules: Arc<dyn RuleRepository>,
        events: Arc<dyn EventRepository>,
        executor: ActionExecutor,
    ) -> Self {
        Self { rules, events, executor }
    }

    /// Run the full pipeline for one event. Fire-and-forget toward
    /// producers: every failure is logged here, nothing propagates.
    pub async fn ingest(&self, input: WorkflowEventInput) {
        let event_type = input.event_type.clone();
        let entity_id = input.entity_id.clone();
        if let Err(error) = self.process(input).await {
            warn!(
                event_type = %event_type,
                entity_id = %entity_id,
                error = %error,
                "failed to process automation event"
            );
        }
    }

    async fn process(&self, input: WorkflowEventInput) -> Result<(), RepositoryError> {
        let event_id = self.events.insert(input.clone()).await?;

        let applicable = self.applicable_rules(&input).await;
        debug!(
            event_type = %input.event_type,
            entity_id = %input.entity_id,
            matched = applicable.len(),
            "matched automation rules"
        );

        let mut results = Vec::with_capacity(applicable.len());
        for rule in &applicable {
            results.push(self.execute_rule(rule, &input).await);
        }

        for result in results.iter().filter(|result| result.success) {
            // A lost increment only under-counts the soft trigger counter;
            // the result itself stays successful.
            if let Err(error) = self.rules.record_trigger(&result.rule_id).await {
                warn!(rule_id = %result.rule_id.0, error = %error, "failed to record rule trigger");
            }
        }

        self.events.finalize(&event_id, &results).await?;
        info!(
            event_id = %event_id.0,
            event_type = %input.event_type,
            results = results.len(),
            "automation event processed"
        );
        Ok(())
    }

    /// Enabled rules whose trigger type maps to this event type and whose
    /// conditions all hold against the event payload. A rule-fetch failure
    /// degrades to "no rules" so the event still finalizes.
    async fn applicable_rules(&self, input: &WorkflowEventInput) -> Vec<AutomationRule> {
        let enabled = match self.rules.list_enabled().await {
            Ok(rules) => rules,
            Err(error) => {
                warn!(error = %error, "failed to load automation rules");
                return Vec::new();
            }
        };

        enabled
            .into_iter()
            .filter(|rule| matches_trigger(rule.trigger_type, &input.event_type))
            .filter(|rule| evaluate_conditions(&rule.conditions, &input.data))
            .collect()
    }

    /// Execute one rule's actions in array order. The first failing action
    /// aborts the remainder of this rule only.
    async fn execute_rule(
        &self,
        rule: &AutomationRule,
        input: &WorkflowEventInput,
    ) -> AutomationResult {
        let mut result = AutomationResult {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            success: true,
            error: None,
            actions_executed: Vec::new(),
            executed_at: Utc::now(),
        };

        for action in &rule.actions {
            match self.executor.execute(action, input, rule).await {
                Ok(()) => result.actions_executed.push(action.kind().to_string()),
                Err(error) => {
                    warn!(
                        rule = %rule.name,
                        action = action.kind(),
                        error = %error,
                        "automation action failed"
                    );
                    result.success = false;
                    result.error = Some(error.to_string());
                    break;
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use brokerflow_core::chrono::Utc;
    use serde_json::json;

    use brokerflow_ai::CannedTextGenerator;
    use brokerflow_core::domain::event::{EntityType, WorkflowEventInput};
    use brokerflow_core::domain::rule::{
        AutomationAction, AutomationCondition, ConditionOperator, NewAutomationRule,
        NotifyBrokerParams, RulePriority, TriggerType, UpdateStatusParams,
    };
    use brokerflow_db::repositories::{EventRepository, RuleRepository};
    use brokerflow_db::{
        DocumentStore, InMemoryDocumentStore, InMemoryEventRepository, InMemoryRuleRepository,
    };

    use super::AutomationOrchestrator;
    use crate::actions::ActionExecutor;

    struct Harness {
        store: Arc<InMemoryDocumentStore>,
        rules: Arc<InMemoryRuleRepository>,
        events: Arc<InMemoryEventRepository>,
        orchestrator: AutomationOrchestrator,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryDocumentStore::new());
        let rules = Arc::new(InMemoryRuleRepository::new());
        let events = Arc::new(InMemoryEventRepository::new());
        let executor = ActionExecutor::new(
            store.clone(),
            Arc::new(CannedTextGenerator::new("We recommend a manual review.")),
        );
        let orchestrator =
            AutomationOrchestrator::new(rules.clone(), events.clone(), executor);
        Harness { store, rules, events, orchestrator }
    }

    fn claim_event() -> WorkflowEventInput {
        WorkflowEventInput {
            event_type: "claim_updated".to_string(),
            entity_id: "C1".to_string(),
            entity_type: EntityType::Claim,
            data: json!({"status": "submitted", "amount": 4800}),
            occurred_at: Utc::now(),
        }
    }

    fn notify_rule(enabled: bool) -> NewAutomationRule {
        NewAutomationRule {
            name: "Notify broker on claim".to_string(),
            description: String::new(),
            trigger_type: TriggerType::ClaimSubmitted,
            conditions: Vec::new(),
            actions: vec![AutomationAction::NotifyBroker(NotifyBrokerParams {
                title: None,
                message: None,
                priority: None,
                broker_id: "B1".to_string(),
            })],
            enabled,
            priority: RulePriority::Medium,
        }
    }

    #[tokio::test]
    async fn matching_rule_produces_a_successful_result_and_side_effect() {
        let harness = harness();
        harness.rules.create(notify_rule(true)).await.expect("create rule");

        harness.orchestrator.ingest(claim_event()).await;

        let notifications =
            harness.store.query("notifications", &[]).await.expect("query notifications");
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].data["entityId"], "C1");

        let events = harness.events.all().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].processed);
        assert_eq!(events[0].results.len(), 1);
        assert!(events[0].results[0].success);
        assert_eq!(events[0].results[0].actions_executed, vec!["notify_broker".to_string()]);

        let rule = &harness.rules.list_all().await.expect("list rules")[0];
        assert_eq!(rule.trigger_count, 1);
        assert!(rule.last_triggered.is_some());
    }

    #[tokio::test]
    async fn event_is_finalized_with_results() {
        let harness = harness();
        harness.rules.create(notify_rule(true)).await.expect("create rule");

        harness.orchestrator.ingest(claim_event()).await;

        assert!(harness.events.list_unprocessed().await.expect("unprocessed").is_empty());
    }

    #[tokio::test]
    async fn disabled_rules_never_produce_results() {
        let harness = harness();
        harness.rules.create(notify_rule(false)).await.expect("create rule");

        harness.orchestrator.ingest(claim_event()).await;

        assert!(harness
            .store
            .query("notifications", &[])
            .await
            .expect("query notifications")
            .is_empty());
        let rule = &harness.rules.list_all().await.expect("list rules")[0];
        assert_eq!(rule.trigger_count, 0);
    }

    #[tokio::test]
    async fn non_matching_trigger_types_are_filtered_out() {
        let harness = harness();
        let mut rule = notify_rule(true);
        rule.trigger_type = TriggerType::ApplicationSubmitted;
        harness.rules.create(rule).await.expect("create rule");

        harness.orchestrator.ingest(claim_event()).await;

        assert!(harness
            .store
            .query("notifications", &[])
            .await
            .expect("query notifications")
            .is_empty());
    }

    #[tokio::test]
    async fn failing_conditions_suppress_the_rule() {
        let harness = harness();
        let mut rule = notify_rule(true);
        rule.conditions = vec![AutomationCondition {
            field: "status".to_string(),
            operator: ConditionOperator::Equals,
            value: json!("closed"),
        }];
        harness.rules.create(rule).await.expect("create rule");

        harness.orchestrator.ingest(claim_event()).await;

        assert!(harness
            .store
            .query("notifications", &[])
            .await
            .expect("query notifications")
            .is_empty());
    }

    #[tokio::test]
    async fn failing_action_fails_its_rule_but_not_siblings() {
        let harness = harness();

        // First rule patches a document that does not exist.
        let mut broken = notify_rule(true);
        broken.name = "Broken status patch".to_string();
        broken.actions = vec![
            AutomationAction::UpdateStatus(UpdateStatusParams {
                collection: "claims".to_string(),
                field: "status".to_string(),
                value: json!("flagged"),
            }),
            AutomationAction::NotifyBroker(NotifyBrokerParams {
                title: None,
                message: None,
                priority: None,
                broker_id: "B1".to_string(),
            }),
        ];
        let broken = harness.rules.create(broken).await.expect("create broken rule");
        let healthy = harness.rules.create(notify_rule(true)).await.expect("create healthy rule");

        harness.orchestrator.ingest(claim_event()).await;

        let events = harness.events.all().await;
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert!(event.processed);
        assert_eq!(event.results.len(), 2);

        let broken_result = event
            .results
            .iter()
            .find(|result| result.rule_id == broken.id)
            .expect("broken rule result");
        assert!(!broken_result.success);
        assert!(broken_result.error.is_some());
        assert!(broken_result.actions_executed.is_empty());

        let healthy_result = event
            .results
            .iter()
            .find(|result| result.rule_id == healthy.id)
            .expect("healthy rule result");
        assert!(healthy_result.success);
        assert_eq!(healthy_result.actions_executed, vec!["notify_broker".to_string()]);

        // One notification from the healthy rule only: the broken rule
        // aborted before its own notify action.
        let notifications =
            harness.store.query("notifications", &[]).await.expect("query notifications");
        assert_eq!(notifications.len(), 1);

        let broken_after = harness
            .rules
            .find_by_id(&broken.id)
            .await
            .expect("find broken")
            .expect("broken exists");
        assert_eq!(broken_after.trigger_count, 0);

        let healthy_after = harness
            .rules
            .find_by_id(&healthy.id)
            .await
            .expect("find healthy")
            .expect("healthy exists");
        assert_eq!(healthy_after.trigger_count, 1);
    }

    #[tokio::test]
    async fn unknown_action_kind_still_counts_as_executed() {
        let harness = harness();
        let mut rule = notify_rule(true);
        rule.actions = vec![serde_json::from_value(json!({
            "type": "teleport",
            "parameters": {}
        }))
        .expect("deserialize unknown action")];
        let created = harness.rules.create(rule).await.expect("create rule");

        harness.orchestrator.ingest(claim_event()).await;

        let events = harness.events.all().await;
        assert_eq!(events.len(), 1);
        let result = &events[0].results[0];
        assert!(result.success);
        assert_eq!(result.actions_executed, vec!["teleport".to_string()]);

        let stored =
            harness.rules.find_by_id(&created.id).await.expect("find rule").expect("rule");
        assert_eq!(stored.trigger_count, 1, "unknown actions succeed as no-ops");
    }

    #[tokio::test]
    async fn two_matching_rules_both_execute_regardless_of_priority() {
        let harness = harness();
        let mut high = notify_rule(true);
        high.name = "High priority".to_string();
        high.priority = RulePriority::High;
        let mut low = notify_rule(true);
        low.name = "Low priority".to_string();
        low.priority = RulePriority::Low;

        harness.rules.create(high).await.expect("create high");
        harness.rules.create(low).await.expect("create low");

        harness.orchestrator.ingest(claim_event()).await;

        let notifications =
            harness.store.query("notifications", &[]).await.expect("query notifications");
        assert_eq!(notifications.len(), 2);
        for rule in harness.rules.list_all().await.expect("list rules") {
            assert_eq!(rule.trigger_count, 1);
        }
    }

    #[tokio::test]
    async fn sweep_specialized_event_types_match_no_rules() {
        let harness = harness();
        let mut rule = notify_rule(true);
        rule.trigger_type = TriggerType::PolicyExpiring;
        harness.rules.create(rule).await.expect("create rule");

        harness
            .orchestrator
            .ingest(WorkflowEventInput {
                event_type: "policy_expiring".to_string(),
                entity_id: "P1".to_string(),
                entity_type: EntityType::Policy,
                data: json!({"status": "active"}),
                occurred_at: Utc::now(),
            })
            .await;

        assert!(harness
            .store
            .query("notifications", &[])
            .await
            .expect("query notifications")
            .is_empty());
        // The event is still persisted and finalized with zero results.
        assert!(harness.events.list_unprocessed().await.expect("unprocessed").is_empty());
    }
}
