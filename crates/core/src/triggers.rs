//! Static mapping from rule trigger types to the event types they fire on.

use crate::domain::rule::TriggerType;

/// Event types a trigger type listens for.
///
/// `policy_expiring` and `payment_overdue` rules match the generic
/// `policy_updated` change events and must discriminate intent through their
/// conditions. The sweep scheduler emits specialized `policy_expiring` /
/// `payment_overdue` event types, which are not listed here, so rules of
/// those trigger types do not fire from sweep events.
pub fn event_types_for(trigger_type: TriggerType) -> &'static [&'static str] {
    match trigger_type {
        TriggerType::ApplicationSubmitted => &["quote_updated"],
        TriggerType::ClaimSubmitted => &["claim_updated"],
        TriggerType::DocumentUpload => &["document_added"],
        TriggerType::PolicyExpiring => &["policy_updated"],
        TriggerType::PaymentOverdue => &["policy_updated"],
    }
}

pub fn matches_trigger(trigger_type: TriggerType, event_type: &str) -> bool {
    event_types_for(trigger_type).contains(&event_type)
}
