use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    DocumentUpload,
    ClaimSubmitted,
    PolicyExpiring,
    PaymentOverdue,
    ApplicationSubmitted,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentUpload => "document_upload",
            Self::ClaimSubmitted => "claim_submitted",
            Self::PolicyExpiring => "policy_expiring",
            Self::PaymentOverdue => "payment_overdue",
            Self::ApplicationSubmitted => "application_submitted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "document_upload" => Some(Self::DocumentUpload),
            "claim_submitted" => Some(Self::ClaimSubmitted),
            "policy_expiring" => Some(Self::PolicyExpiring),
            "payment_overdue" => Some(Self::PaymentOverdue),
            "application_submitted" => Some(Self::ApplicationSubmitted),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePriority {
    Low,
    Medium,
    High,
}

impl RulePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Condition operators. Operators not in the known set still deserialize
/// (as `Other`) and evaluate true at runtime, so a rule written against a
/// newer vocabulary degrades to firing rather than being silently disabled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    DateWithin,
    #[serde(untagged)]
    Other(String),
}

impl ConditionOperator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::DateWithin => "date_within",
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutomationCondition {
    pub field: String,
    pub operator: ConditionOperator,
    pub value: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailParams {
    pub recipient: String,
    pub subject: String,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskParams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusParams {
    pub collection: String,
    pub field: String,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDocumentParams {
    pub template: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiReviewParams {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyBrokerParams {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    pub broker_id: String,
}

/// Catch-all for action kinds outside the known vocabulary. Execution logs
/// a warning and skips the action; the kind tag is still recorded in the
/// result's `actions_executed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnknownAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: Value,
}

/// One effect a rule performs when its conditions hold. Stored as
/// `{"type": ..., "parameters": {...}}`; parameters are typed per kind and
/// checked at rule-creation time. A payload that does not fit any known
/// variant falls through to `Other` and stays inert at execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters", rename_all = "snake_case")]
pub enum AutomationAction {
    SendEmail(SendEmailParams),
    CreateTask(CreateTaskParams),
    UpdateStatus(UpdateStatusParams),
    GenerateDocument(GenerateDocumentParams),
    AiReview(AiReviewParams),
    NotifyBroker(NotifyBrokerParams),
    #[serde(untagged)]
    Other(UnknownAction),
}

impl AutomationAction {
    pub fn kind(&self) -> &str {
        match self {
            Self::SendEmail(_) => "send_email",
            Self::CreateTask(_) => "create_task",
            Self::UpdateStatus(_) => "update_status",
            Self::GenerateDocument(_) => "generate_document",
            Self::AiReview(_) => "ai_review",
            Self::NotifyBroker(_) => "notify_broker",
            Self::Other(unknown) => &unknown.kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRule {
    pub id: RuleId,
    pub name: String,
    pub description: String,
    pub trigger_type: TriggerType,
    pub conditions: Vec<AutomationCondition>,
    pub actions: Vec<AutomationAction>,
    pub enabled: bool,
    pub priority: RulePriority,
    pub created_at: DateTime<Utc>,
    pub last_triggered: Option<DateTime<Utc>>,
    pub trigger_count: u64,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for rule creation; the repository assigns id, `created_at`, and a
/// zero trigger count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAutomationRule {
    pub name: String,
    pub description: String,
    pub trigger_type: TriggerType,
    pub conditions: Vec<AutomationCondition>,
    pub actions: Vec<AutomationAction>,
    pub enabled: bool,
    pub priority: RulePriority,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub trigger_type: Option<TriggerType>,
    pub conditions: Option<Vec<AutomationCondition>>,
    pub actions: Option<Vec<AutomationAction>>,
    pub enabled: Option<bool>,
    pub priority: Option<RulePriority>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RuleValidationError {
    #[error("rule name must not be empty")]
    EmptyName,
    #[error("condition {index} has an empty field path")]
    EmptyConditionField { index: usize },
    #[error("action {index} ({kind}) is missing required parameter `{parameter}`")]
    MissingActionParameter { index: usize, kind: &'static str, parameter: &'static str },
}

impl NewAutomationRule {
    /// Structural validation performed at creation time. Unknown action
    /// kinds are accepted; they execute as logged no-ops.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.name.trim().is_empty() {
            return Err(RuleValidationError::EmptyName);
        }
        for (index, condition) in self.conditions.iter().enumerate() {
            if condition.field.trim().is_empty() {
                return Err(RuleValidationError::EmptyConditionField { index });
            }
        }
        for (index, action) in self.actions.iter().enumerate() {
            validate_action(index, action)?;
        }
        Ok(())
    }
}

fn validate_action(index: usize, action: &AutomationAction) -> Result<(), RuleValidationError> {
    let missing = |kind, parameter| RuleValidationError::MissingActionParameter {
        index,
        kind,
        parameter,
    };
    match action {
        AutomationAction::SendEmail(params) => {
            if params.recipient.trim().is_empty() {
                return Err(missing("send_email", "recipient"));
            }
            if params.subject.trim().is_empty() {
                return Err(missing("send_email", "subject"));
            }
        }
        AutomationAction::UpdateStatus(params) => {
            if params.collection.trim().is_empty() {
                return Err(missing("update_status", "collection"));
            }
            if params.field.trim().is_empty() {
                return Err(missing("update_status", "field"));
            }
        }
        AutomationAction::GenerateDocument(params) => {
            if params.template.trim().is_empty() {
                return Err(missing("generate_document", "template"));
            }
        }
        AutomationAction::NotifyBroker(params) => {
            if params.broker_id.trim().is_empty() {
                return Err(missing("notify_broker", "brokerId"));
            }
        }
        AutomationAction::CreateTask(_)
        | AutomationAction::AiReview(_)
        | AutomationAction::Other(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        AutomationAction, AutomationCondition, ConditionOperator, NewAutomationRule, RulePriority,
        RuleValidationError, TriggerType, UpdateStatusParams,
    };

    #[test]
    fn trigger_type_round_trips_from_storage_encoding() {
        let cases = [
            TriggerType::DocumentUpload,
            TriggerType::ClaimSubmitted,
            TriggerType::PolicyExpiring,
            TriggerType::PaymentOverdue,
            TriggerType::ApplicationSubmitted,
        ];

        for trigger in cases {
            assert_eq!(TriggerType::parse(trigger.as_str()), Some(trigger));
        }
    }

    #[test]
    fn priority_round_trips_from_storage_encoding() {
        for priority in [RulePriority::Low, RulePriority::Medium, RulePriority::High] {
            assert_eq!(RulePriority::parse(priority.as_str()), Some(priority));
        }
    }

    #[test]
    fn known_action_deserializes_into_typed_variant() {
        let action: AutomationAction = serde_json::from_value(json!({
            "type": "update_status",
            "parameters": {"collection": "claims", "field": "status", "value": "flagged"}
        }))
        .expect("deserialize update_status");

        assert_eq!(
            action,
            AutomationAction::UpdateStatus(UpdateStatusParams {
                collection: "claims".to_string(),
                field: "status".to_string(),
                value: json!("flagged"),
            })
        );
        assert_eq!(action.kind(), "update_status");
    }

    #[test]
    fn unknown_action_kind_is_preserved_through_catch_all() {
        let action: AutomationAction = serde_json::from_value(json!({
            "type": "teleport",
            "parameters": {"destination": "filing-cabinet"}
        }))
        .expect("deserialize unknown action");

        assert_eq!(action.kind(), "teleport");
        let round_trip = serde_json::to_value(&action).expect("serialize unknown action");
        assert_eq!(round_trip["type"], "teleport");
        assert_eq!(round_trip["parameters"]["destination"], "filing-cabinet");
    }

    #[test]
    fn unknown_operator_is_preserved_through_catch_all() {
        let operator: ConditionOperator =
            serde_json::from_value(json!("matches_regex")).expect("deserialize unknown operator");
        assert_eq!(operator, ConditionOperator::Other("matches_regex".to_string()));
        assert_eq!(operator.as_str(), "matches_regex");
    }

    #[test]
    fn validation_rejects_empty_name_and_empty_condition_field() {
        let mut rule = sample_rule();
        rule.name = "  ".to_string();
        assert_eq!(rule.validate(), Err(RuleValidationError::EmptyName));

        let mut rule = sample_rule();
        rule.conditions.push(AutomationCondition {
            field: String::new(),
            operator: ConditionOperator::Equals,
            value: json!("auto"),
        });
        assert_eq!(rule.validate(), Err(RuleValidationError::EmptyConditionField { index: 0 }));
    }

    #[test]
    fn validation_rejects_update_status_without_target() {
        let mut rule = sample_rule();
        rule.actions = vec![AutomationAction::UpdateStatus(UpdateStatusParams {
            collection: "claims".to_string(),
            field: String::new(),
            value: json!("flagged"),
        })];

        assert_eq!(
            rule.validate(),
            Err(RuleValidationError::MissingActionParameter {
                index: 0,
                kind: "update_status",
                parameter: "field",
            })
        );
    }

    #[test]
    fn validation_accepts_unknown_action_kinds() {
        let mut rule = sample_rule();
        rule.actions = vec![serde_json::from_value(json!({
            "type": "teleport",
            "parameters": {}
        }))
        .expect("deserialize unknown action")];

        assert_eq!(rule.validate(), Ok(()));
    }

    fn sample_rule() -> NewAutomationRule {
        NewAutomationRule {
            name: "Acknowledge new claims".to_string(),
            description: "Notify the broker when a claim is submitted".to_string(),
            trigger_type: TriggerType::ClaimSubmitted,
            conditions: Vec::new(),
            actions: Vec::new(),
            enabled: true,
            priority: RulePriority::Medium,
        }
    }
}
