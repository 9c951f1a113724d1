//! Condition evaluation over event payloads.
//!
//! Conditions are AND-composed; an empty list always passes. Operands come
//! from a dot-path lookup into the event's entity snapshot, and every
//! data-shape problem (missing field, non-numeric operand, unparsable date)
//! evaluates false rather than erroring. Unknown operators evaluate true.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use crate::domain::rule::{AutomationCondition, ConditionOperator};

/// Follow a dot-path through nested objects. Any absent segment yields
/// `None`; non-object intermediates never panic.
pub fn field_value<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |value, segment| value.as_object()?.get(segment))
}

pub fn evaluate_conditions(conditions: &[AutomationCondition], data: &Value) -> bool {
    evaluate_at(conditions, data, Utc::now())
}

fn evaluate_at(conditions: &[AutomationCondition], data: &Value, now: DateTime<Utc>) -> bool {
    conditions.iter().all(|condition| evaluate_condition(condition, data, now))
}

fn evaluate_condition(condition: &AutomationCondition, data: &Value, now: DateTime<Utc>) -> bool {
    if let ConditionOperator::Other(raw) = &condition.operator {
        warn!(operator = %raw, field = %condition.field, "unknown condition operator, passing");
        return true;
    }

    let Some(field) = field_value(data, &condition.field) else {
        return false;
    };

    match &condition.operator {
        ConditionOperator::Equals => field == &condition.value,
        ConditionOperator::Contains => as_display_string(field)
            .to_lowercase()
            .contains(&as_display_string(&condition.value).to_lowercase()),
        ConditionOperator::GreaterThan => match (as_number(field), as_number(&condition.value)) {
            (Some(left), Some(right)) => left > right,
            _ => false,
        },
        ConditionOperator::LessThan => match (as_number(field), as_number(&condition.value)) {
            (Some(left), Some(right)) => left < right,
            _ => false,
        },
        ConditionOperator::DateWithin => match (parse_date(field), as_number(&condition.value)) {
            // One-sided window: any date up to N days out, including the
            // whole past.
            (Some(date), Some(days)) => days_until(date, now) as f64 <= days,
            _ => false,
        },
        ConditionOperator::Other(_) => true,
    }
}

/// Whole days from `now` until `date`, rounded up.
pub fn days_until(date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (date - now).num_seconds();
    (seconds as f64 / 86_400.0).ceil() as i64
}

/// Parse a document field as a UTC instant: RFC 3339, bare date, or epoch
/// milliseconds.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
                return Some(parsed.with_timezone(&Utc));
            }
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
            Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
        }
        Value::Number(millis) => Utc.timestamp_millis_opt(millis.as_i64()?).single(),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn as_display_string(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::{evaluate_at, field_value};
    use crate::domain::rule::{AutomationCondition, ConditionOperator};

    fn condition(field: &str, operator: ConditionOperator, value: serde_json::Value) -> AutomationCondition {
        AutomationCondition { field: field.to_string(), operator, value }
    }

    #[test]
    fn empty_condition_list_always_passes() {
        assert!(evaluate_at(&[], &json!({}), Utc::now()));
        assert!(evaluate_at(&[], &json!({"anything": 1}), Utc::now()));
    }

    #[test]
    fn equals_is_strict_and_cross_type_comparisons_fail() {
        let data = json!({"status": "active", "count": 3});
        let now = Utc::now();

        assert!(evaluate_at(
            &[condition("status", ConditionOperator::Equals, json!("active"))],
            &data,
            now
        ));
        assert!(!evaluate_at(
            &[condition("status", ConditionOperator::Equals, json!("ACTIVE"))],
            &data,
            now
        ));
        assert!(!evaluate_at(
            &[condition("count", ConditionOperator::Equals, json!("3"))],
            &data,
            now
        ));
    }

    #[test]
    fn contains_is_case_insensitive_over_stringified_operands() {
        let data = json!({"productType": "auto insurance", "premium": 1250});
        let now = Utc::now();

        assert!(evaluate_at(
            &[condition("productType", ConditionOperator::Contains, json!("AUTO"))],
            &data,
            now
        ));
        assert!(evaluate_at(
            &[condition("premium", ConditionOperator::Contains, json!(25))],
            &data,
            now
        ));
        assert!(!evaluate_at(
            &[condition("productType", ConditionOperator::Contains, json!("marine"))],
            &data,
            now
        ));
    }

    #[test]
    fn numeric_comparisons_coerce_strings_and_reject_non_numbers() {
        let data = json!({"premium": "2500", "status": "active"});
        let now = Utc::now();

        assert!(evaluate_at(
            &[condition("premium", ConditionOperator::GreaterThan, json!(1000))],
            &data,
            now
        ));
        assert!(evaluate_at(
            &[condition("premium", ConditionOperator::LessThan, json!("9000"))],
            &data,
            now
        ));
        // NaN-style operands compare false.
        assert!(!evaluate_at(
            &[condition("status", ConditionOperator::GreaterThan, json!(0))],
            &data,
            now
        ));
    }

    #[test]
    fn date_within_passes_at_the_boundary_and_for_past_dates() {
        let now = Utc::now();
        let in_seven_days = (now + Duration::days(7)).to_rfc3339();
        let in_eight_days = (now + Duration::days(8)).to_rfc3339();
        let last_year = (now - Duration::days(365)).to_rfc3339();

        let within = |date: &str| {
            evaluate_at(
                &[condition(
                    "dates.expiration",
                    ConditionOperator::DateWithin,
                    json!(7),
                )],
                &json!({"dates": {"expiration": date}}),
                now,
            )
        };

        assert!(within(&in_seven_days));
        assert!(!within(&in_eight_days));
        assert!(within(&last_year));
    }

    #[test]
    fn missing_fields_fail_known_operators() {
        let data = json!({"payment": {"status": "late"}});
        let now = Utc::now();

        assert!(!evaluate_at(
            &[condition("payment.nextDueDate", ConditionOperator::Equals, json!("x"))],
            &data,
            now
        ));
        assert!(!evaluate_at(
            &[condition("missing.entirely", ConditionOperator::Contains, json!("x"))],
            &data,
            now
        ));
    }

    #[test]
    fn unknown_operator_fails_open() {
        let data = json!({"status": "active"});
        assert!(evaluate_at(
            &[condition(
                "status",
                ConditionOperator::Other("matches_regex".to_string()),
                json!("^a"),
            )],
            &data,
            Utc::now()
        ));
    }

    #[test]
    fn conditions_are_and_composed() {
        let data = json!({"status": "active", "premium": 500});
        let now = Utc::now();
        let passing = condition("status", ConditionOperator::Equals, json!("active"));
        let failing = condition("premium", ConditionOperator::GreaterThan, json!(1000));

        assert!(!evaluate_at(&[passing.clone(), failing], &data, now));
        assert!(evaluate_at(&[passing.clone(), passing], &data, now));
    }

    #[test]
    fn field_lookup_follows_dot_paths_without_panicking() {
        let data = json!({"payment": {"nextDueDate": "2026-09-01", "amount": 120}});

        assert_eq!(field_value(&data, "payment.amount"), Some(&json!(120)));
        assert_eq!(field_value(&data, "payment.amount.cents"), None);
        assert_eq!(field_value(&data, "nope"), None);
    }
}
