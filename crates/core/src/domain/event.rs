use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::rule::RuleId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Quote,
    Policy,
    Claim,
    Customer,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Policy => "policy",
            Self::Claim => "claim",
            Self::Customer => "customer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quote" => Some(Self::Quote),
            "policy" => Some(Self::Policy),
            "claim" => Some(Self::Claim),
            "customer" => Some(Self::Customer),
            _ => None,
        }
    }
}

/// An event as produced by a watcher, sweep, or manual trigger; the event
/// store assigns the id at persistence time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEventInput {
    #[serde(rename = "type")]
    pub event_type: String,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub data: Value,
    pub occurred_at: DateTime<Utc>,
}

/// A persisted workflow event. `processed` transitions false -> true exactly
/// once; appending the result list is the only post-creation write.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEvent {
    pub id: EventId,
    #[serde(rename = "type")]
    pub event_type: String,
    pub entity_id: String,
    pub entity_type: EntityType,
    pub data: Value,
    pub occurred_at: DateTime<Utc>,
    pub processed: bool,
    #[serde(default)]
    pub results: Vec<AutomationResult>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of attempting one rule's actions against one event. `rule_name`
/// is a snapshot: renaming the rule later must not rewrite history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationResult {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub actions_executed: Vec<String>,
    pub executed_at: DateTime<Utc>,
}
