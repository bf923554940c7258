use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Ask the endpoint for a JSON object response.
    pub json_object: bool,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn model(&self) -> &str;

    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String>;
}
