//! Prompt templates and response post-processing for automated reviews.

use serde_json::Value;

use crate::domain::event::EntityType;

const MAX_RECOMMENDATIONS: usize = 5;

/// Default prompt when a rule's `ai_review` action carries none of its own.
pub fn default_review_prompt(entity_type: EntityType, data: &Value) -> String {
    let snapshot = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    match entity_type {
        EntityType::Quote => format!(
            "Analyze this insurance quote application and provide risk assessment and recommendations:\n\n{snapshot}"
        ),
        EntityType::Claim => format!(
            "Review this insurance claim for fraud indicators and processing recommendations:\n\n{snapshot}"
        ),
        EntityType::Policy => format!(
            "Evaluate this insurance policy for renewal recommendations and risk factors:\n\n{snapshot}"
        ),
        EntityType::Customer => {
            format!("Analyze this insurance-related data and provide insights:\n\n{snapshot}")
        }
    }
}

/// Pull recommendation-looking lines out of a generated review: lines that
/// mention "recommend" or carry a bullet marker, trimmed, longer than ten
/// characters, capped at five.
pub fn extract_recommendations(response: &str) -> Vec<String> {
    response
        .lines()
        .filter(|line| {
            line.to_lowercase().contains("recommend") || line.contains('•') || line.contains('-')
        })
        .map(str::trim)
        .filter(|line| line.len() > 10)
        .map(str::to_string)
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{default_review_prompt, extract_recommendations};
    use crate::domain::event::EntityType;

    #[test]
    fn default_prompts_vary_by_entity_type() {
        let data = json!({"status": "submitted"});

        let claim = default_review_prompt(EntityType::Claim, &data);
        assert!(claim.contains("fraud indicators"));
        assert!(claim.contains("\"status\""));

        let quote = default_review_prompt(EntityType::Quote, &data);
        assert!(quote.contains("risk assessment"));

        let policy = default_review_prompt(EntityType::Policy, &data);
        assert!(policy.contains("renewal recommendations"));
    }

    #[test]
    fn extraction_keeps_recommendation_lines_and_bullets() {
        let response = "Summary of the claim.\n\
            We recommend escalating to a senior adjuster.\n\
            • Verify the police report\n\
            - Request repair invoices\n\
            ok\n";

        let recommendations = extract_recommendations(response);
        assert_eq!(recommendations.len(), 3);
        assert!(recommendations[0].contains("recommend"));
        assert!(recommendations[1].starts_with('•'));
    }

    #[test]
    fn extraction_drops_short_lines_and_caps_at_five() {
        let response = "- a\n\
            - first long recommendation line\n\
            - second long recommendation line\n\
            - third long recommendation line\n\
            - fourth long recommendation line\n\
            - fifth long recommendation line\n\
            - sixth long recommendation line\n";

        let recommendations = extract_recommendations(response);
        assert_eq!(recommendations.len(), 5);
        assert!(recommendations.iter().all(|line| line.len() > 10));
    }
}
