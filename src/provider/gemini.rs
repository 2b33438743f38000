//! Gemini completion adapter

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::gemini;

use super::{CompletionProvider, CompletionRequest, ProviderError};

pub struct GeminiProvider {
    client: gemini::Client,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, model: &str) -> Result<Self, ProviderError> {
        let client = gemini::Client::new(api_key).map_err(|e| {
            ProviderError::Configuration(format!("Failed to create Gemini client: {}", e))
        })?;

        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(&request.system_prompt)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build();

        let text = agent
            .prompt(request.user_prompt.as_str())
            .await
            .map_err(|e| ProviderError::Completion(e.to_string()))?;

        if text.trim().is_empty() {
            return Err(ProviderError::Empty);
        }

        Ok(text)
    }
}
