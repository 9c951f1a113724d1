//! Generated-text collaborator for the automation platform.
//!
//! Everything LLM-shaped goes through the `TextGenerator` trait so the rest
//! of the system never touches a vendor API directly:
//! - `http` - OpenAI-compatible chat-completions client
//! - `assistant` - role-aware chat assistance with canned fallbacks
//!
//! # Safety Principle
//!
//! Generated text is advisory only. Reviews and chat responses are stored
//! or shown, never fed back into rule evaluation or entity state.

pub mod assistant;
pub mod generator;
pub mod http;

pub use assistant::{ChatAssistant, ChatContext, UserRole};
pub use generator::{CannedTextGenerator, GenerationOptions, TextGenerator};
pub use http::HttpTextGenerator;
