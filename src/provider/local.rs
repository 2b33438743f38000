//! Local OpenAI-compatible completion adapter (Ollama, llama.cpp, vLLM)

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;

use super::{CompletionProvider, CompletionRequest, ProviderError};

pub struct LocalProvider {
    client: openai::Client,
    model: String,
}

impl LocalProvider {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self, ProviderError> {
        let client = openai::Client::builder(api_key)
            .base_url(base_url)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!(
                    "Failed to create local completion client: {}",
                    e
                ))
            })?;

        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl CompletionProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
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
