//! Role-aware chat assistance with canned fallbacks.
//!
//! The generator is tried first; if it errors (no key, network, provider
//! outage) the assistant degrades to keyword-matched responses per user
//! role, so the chat surface always answers.

use std::sync::Arc;

use tracing::debug;

use super::generator::{GenerationOptions, TextGenerator};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    Broker,
    Customer,
    Visitor,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Broker => "broker",
            Self::Customer => "customer",
            Self::Visitor => "visitor",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "broker" => Self::Broker,
            "customer" => Self::Customer,
            _ => Self::Visitor,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChatContext {
    pub user_role: UserRole,
}

pub struct ChatAssistant {
    generator: Arc<dyn TextGenerator>,
}

impl ChatAssistant {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn chat(&self, message: &str, context: &ChatContext) -> String {
        let prompt = build_chat_prompt(message, context.user_role);
        match self.generator.generate(&prompt, &GenerationOptions::default()).await {
            Ok(response) => response,
            Err(error) => {
                debug!(error = %error, role = context.user_role.as_str(), "falling back to canned chat response");
                fallback_response(message, context.user_role).to_string()
            }
        }
    }
}

fn build_chat_prompt(message: &str, role: UserRole) -> String {
    format!(
        "User ({role}): {message}\n\nPlease provide a helpful response as an insurance platform AI assistant.",
        role = role.as_str()
    )
}

fn fallback_response(message: &str, role: UserRole) -> &'static str {
    let message = message.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|keyword| message.contains(keyword));

    match role {
        UserRole::Admin => {
            if mentions(&["user", "manage"]) {
                "You can manage users through the App Admin Area in the sidebar: view user activity, manage permissions, and configure system settings."
            } else if mentions(&["currency", "money"]) {
                "Configure global currency settings in App Admin Area > Currency Settings. This updates currency formatting throughout the application for all users."
            } else if mentions(&["product", "insurance"]) {
                "Manage insurance product types and categories in App Admin Area > Product Types: add categories, create product types, and set base premiums."
            } else {
                "As an admin you have access to system management tools in the App Admin Area: user management, configuration, business oversight, and analytics. What area would you like help with?"
            }
        }
        UserRole::Broker => {
            if mentions(&["client", "customer"]) {
                "You can manage clients through the Clients section: create profiles, track policies and quotes, and use risk assessment to serve them better."
            } else if mentions(&["quote", "price"]) {
                "Create and compare quotes with the quote system. The platform compares rates across carriers and surfaces recommendations automatically."
            } else if mentions(&["commission", "revenue"]) {
                "Track commission and revenue through the Dashboard analytics: real-time performance metrics and detailed reports."
            } else {
                "As a broker you have client management, quote generation, policy administration, and analytics tools. How can I help you today?"
            }
        }
        UserRole::Customer => {
            if mentions(&["policy", "coverage"]) {
                "All your policies are in the Policies section of your dashboard, with coverage details, premium information, and renewal dates."
            } else if mentions(&["claim", "file"]) {
                "To file a claim, go to the Claims section in your dashboard. You can upload supporting documents and track claim status in real time."
            } else if mentions(&["payment", "premium"]) {
                "Manage payments and premium schedules from your dashboard. You can set up autopay or make one-time payments securely online."
            } else {
                "From your dashboard you can manage policies, file claims, make payments, and track coverage. What would you like help with?"
            }
        }
        UserRole::Visitor => {
            if mentions(&["insurance", "coverage"]) {
                "We offer Auto, Home, Life, Health, Business, and Renters insurance, each tailored to your needs with competitive rates."
            } else if mentions(&["quote", "price"]) {
                "Getting a quote is easy: apply online through the Apply section or contact a licensed agent for instant comparisons across carriers."
            } else if mentions(&["agent", "broker"]) {
                "Our licensed insurance professionals can help you find the right coverage. Contact us through the Contact page or schedule a consultation."
            } else {
                "I can help you understand our insurance solutions and how the platform can serve your needs. What are you looking for?"
            }
        }
    }
}
