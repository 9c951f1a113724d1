use std::collections::HashMap;

use brokerflow_core::chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use brokerflow_core::domain::event::{
    AutomationResult, EventId, WorkflowEvent, WorkflowEventInput,
};
use brokerflow_core::domain::rule::{AutomationRule, NewAutomationRule, RuleId, RuleUpdate};

use super::{EventRepository, RepositoryError, RuleRepository};

#[derive(Default)]
pub struct InMemoryRuleRepository {
    rules: RwLock<HashMap<String, AutomationRule>>,
}

impl InMemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RuleRepository for InMemoryRuleRepository {
    async fn create(&self, rule: NewAutomationRule) -> Result<AutomationRule, RepositoryError> {
        let stored = AutomationRule {
            id: RuleId(Uuid::new_v4().to_string()),
            name: rule.name,
            description: rule.description,
            trigger_type: rule.trigger_type,
            conditions: rule.conditions,
            actions: rule.actions,
            enabled: rule.enabled,
            priority: rule.priority,
            created_at: Utc::now(),
            last_triggered: None,
            trigger_count: 0,
            deleted_at: None,
        };

        let mut rules = self.rules.write().await;
        rules.insert(stored.id.0.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<AutomationRule>, RepositoryError> {
        let rules = self.rules.read().await;
        Ok(rules.get(&id.0).cloned())
    }

    async fn list_all(&self) -> Result<Vec<AutomationRule>, RepositoryError> {
        let rules = self.rules.read().await;
        let mut all: Vec<_> = rules.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(all)
    }

    async fn list_enabled(&self) -> Result<Vec<AutomationRule>, RepositoryError> {
        Ok(self.list_all().await?.into_iter().filter(|rule| rule.enabled).collect())
    }

    async fn update(&self, id: &RuleId, update: RuleUpdate) -> Result<(), RepositoryError> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .get_mut(&id.0)
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
        Ok(())
    }

    async fn record_trigger(&self, id: &RuleId) -> Result<(), RepositoryError> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound(format!("automation rule {}", id.0)))?;
        rule.trigger_count += 1;
        rule.last_triggered = Some(Utc::now());
        Ok(())
    }

    async fn soft_delete(&self, id: &RuleId) -> Result<(), RepositoryError> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound(format!("automation rule {}", id.0)))?;
        rule.enabled = false;
        rule.deleted_at = Some(Utc::now());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEventRepository {
    events: RwLock<HashMap<String, WorkflowEvent>>,
}

impl InMemoryEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored event, processed included. Test helper.
    pub async fn all(&self) -> Vec<WorkflowEvent> {
        let events = self.events.read().await;
        let mut all: Vec<_> = events.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        all
    }
}

#[async_trait::async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn insert(&self, input: WorkflowEventInput) -> Result<EventId, RepositoryError> {
        let id = EventId(Uuid::new_v4().to_string());
        let event = WorkflowEvent {
            id: id.clone(),
            event_type: input.event_type,
            entity_id: input.entity_id,
            entity_type: input.entity_type,
            data: input.data,
            occurred_at: input.occurred_at,
            processed: false,
            results: Vec::new(),
            processed_at: None,
            created_at: Utc::now(),
        };

        let mut events = self.events.write().await;
        events.insert(id.0.clone(), event);
        Ok(id)
    }

    async fn find_by_id(&self, id: &EventId) -> Result<Option<WorkflowEvent>, RepositoryError> {
        let events = self.events.read().await;
        Ok(events.get(&id.0).cloned())
    }

    async fn list_unprocessed(&self) -> Result<Vec<WorkflowEvent>, RepositoryError> {
        let events = self.events.read().await;
        let mut unprocessed: Vec<_> =
            events.values().filter(|event| !event.processed).cloned().collect();
        unprocessed
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
        Ok(unprocessed)
    }

    async fn finalize(
        &self,
        id: &EventId,
        results: &[AutomationResult],
    ) -> Result<(), RepositoryError> {
        let mut events = self.events.write().await;
        let event = events
            .get_mut(&id.0)
            .ok_or_else(|| RepositoryError::NotFound(format!("automation event {}", id.0)))?;
        event.results = results.to_vec();
        event.processed = true;
        event.processed_at = Some(Utc::now());
        Ok(())
    }
}
