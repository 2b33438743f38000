//! Text-completion provider adapters
//!
//! Each adapter owns its own SDK unwrapping and exposes the same
//! `(system_prompt, user_prompt, max_tokens, temperature) -> text` surface.

mod gemini;
mod local;
mod openai;

use std::env;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{ProviderConfig, ProviderKind};

pub use gemini::GeminiProvider;
pub use local::LocalProvider;
pub use openai::OpenAiProvider;

const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    #[error("Completion request failed: {0}")]
    Completion(String),

    #[error("Provider returned empty output")]
    Empty,

    #[error("Completion timed out after {0}s")]
    Timeout(u64),
}

/// One enrichment request to a completion provider
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u64,
    pub temperature: f64,
}

/// Uniform interface over OpenAI-, Gemini-, and local-model-compatible
/// completion backends.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Stable identifier recorded on produced explanations
    fn name(&self) -> &'static str;

    /// Model id this provider was configured with
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}

/// Build the configured provider adapter
pub fn build_provider(
    config: &ProviderConfig,
) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
    match config.kind {
        ProviderKind::OpenAi => {
            let api_key = env::var(ENV_OPENAI_API_KEY).map_err(|_| {
                ProviderError::Configuration(format!("{} is not set", ENV_OPENAI_API_KEY))
            })?;
            Ok(Arc::new(OpenAiProvider::new(&api_key, &config.model)?))
        }
        ProviderKind::Gemini => {
            let api_key = env::var(ENV_GEMINI_API_KEY).map_err(|_| {
                ProviderError::Configuration(format!("{} is not set", ENV_GEMINI_API_KEY))
            })?;
            Ok(Arc::new(GeminiProvider::new(&api_key, &config.model)?))
        }
        ProviderKind::Local => {
            let base_url = config.base_url.as_ref().ok_or_else(|| {
                ProviderError::Configuration(
                    "provider.base_url is required for the local provider".to_string(),
                )
            })?;
            // Local OpenAI-compatible servers usually ignore the key
            let api_key =
                env::var(ENV_OPENAI_API_KEY).unwrap_or_else(|_| "not-needed".to_string());
            Ok(Arc::new(LocalProvider::new(
                &api_key,
                base_url.as_str(),
                &config.model,
            )?))
        }
    }
}
