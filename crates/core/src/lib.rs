pub mod conditions;
pub mod config;
pub mod domain;
pub mod review;
pub mod triggers;

pub use chrono;

pub use conditions::evaluate_conditions;
pub use domain::event::{AutomationResult, EntityType, EventId, WorkflowEvent, WorkflowEventInput};
pub use domain::rule::{
    AutomationAction, AutomationCondition, AutomationRule, ConditionOperator, NewAutomationRule,
    RuleId, RulePriority, RuleUpdate, RuleValidationError, TriggerType,
};
pub use triggers::matches_trigger;
