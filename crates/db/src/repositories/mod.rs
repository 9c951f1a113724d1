use async_trait::async_trait;
use thiserror::Error;

use brokerflow_core::domain::event::{AutomationResult, EventId, WorkflowEvent, WorkflowEventInput};
use brokerflow_core::domain::rule::{AutomationRule, NewAutomationRule, RuleId, RuleUpdate};

pub mod event;
pub mod memory;
pub mod rule;

pub use event::SqlEventRepository;
pub use memory::{InMemoryEventRepository, InMemoryRuleRepository};
pub use rule::SqlRuleRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn create(&self, rule: NewAutomationRule) -> Result<AutomationRule, RepositoryError>;

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<AutomationRule>, RepositoryError>;

    /// Every stored rule, soft-deleted included.
    async fn list_all(&self) -> Result<Vec<AutomationRule>, RepositoryError>;

    async fn list_enabled(&self) -> Result<Vec<AutomationRule>, RepositoryError>;

    async fn update(&self, id: &RuleId, update: RuleUpdate) -> Result<(), RepositoryError>;

    /// Bump the trigger counter and stamp `last_triggered`. This is a
    /// read-modify-write, not a transactional increment; concurrent
    /// triggers can lose an update.
    async fn record_trigger(&self, id: &RuleId) -> Result<(), RepositoryError>;

    /// Disable and stamp `deleted_at`; rules are never physically removed.
    async fn soft_delete(&self, id: &RuleId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Persist an unprocessed event, assigning its id.
    async fn insert(&self, input: WorkflowEventInput) -> Result<EventId, RepositoryError>;

    async fn find_by_id(&self, id: &EventId) -> Result<Option<WorkflowEvent>, RepositoryError>;

    async fn list_unprocessed(&self) -> Result<Vec<WorkflowEvent>, RepositoryError>;

    /// Attach results and flip `processed`; the event's only post-creation
    /// write.
    async fn finalize(
        &self,
        id: &EventId,
        results: &[AutomationResult],
    ) -> Result<(), RepositoryError>;
}
