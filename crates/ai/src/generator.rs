use anyhow::Result;
use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self { temperature: 0.7, max_tokens: 1024 }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}

/// Deterministic generator for tests and offline runs.
#[derive(Clone, Debug, Default)]
pub struct CannedTextGenerator {
    response: String,
}

impl CannedTextGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: response.into() }
    }
}

#[async_trait]
impl TextGenerator for CannedTextGenerator {
    async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<String> {
        Ok(self.response.clone())
    }
}
