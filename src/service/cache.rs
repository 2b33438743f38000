//! Redis cache for generated explanations
//!
//! Optional: the service runs without it and logs a warning. Keys are
//! SHA-256 composites so a prompt or model change invalidates naturally.

use std::env;

use redis::{AsyncCommands, Client};
use sha2::{Digest, Sha256};

use crate::model::CanonicalExplanation;

// Environment variable names
const ENV_REDIS_HOST: &str = "TRIAGE_REDIS_HOST";
const ENV_REDIS_PORT: &str = "TRIAGE_REDIS_PORT";
const ENV_REDIS_PASSWORD: &str = "TRIAGE_REDIS_PASSWORD";
const ENV_REDIS_DB: &str = "TRIAGE_REDIS_DB";

// Default values
const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
const DEFAULT_REDIS_PORT: &str = "6379";
const DEFAULT_REDIS_DB: &str = "0";

// Explanations are stable for a given (alert text, prompt, model)
const EXPLANATION_TTL_SECONDS: u64 = 30 * 24 * 60 * 60; // 30 days

const PREFIX_EXPLANATION: &str = "explanation:";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    #[error("Redis connection error: {0}")]
    Connection(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache miss for key: {0}")]
    Miss(String),
}

/// Redis-backed cache for canonical explanations
#[derive(Clone)]
pub struct ExplanationCache {
    client: Client,
}

impl ExplanationCache {
    /// Create a new cache instance and verify connection
    ///
    /// Configuration via environment variables:
    /// - `TRIAGE_REDIS_HOST` - Redis host (default: 127.0.0.1)
    /// - `TRIAGE_REDIS_PORT` - Redis port (default: 6379)
    /// - `TRIAGE_REDIS_PASSWORD` - Redis password (default: none)
    /// - `TRIAGE_REDIS_DB` - Redis database number (default: 0)
    pub async fn new() -> Result<Self, CacheError> {
        let host = env::var(ENV_REDIS_HOST).unwrap_or_else(|_| DEFAULT_REDIS_HOST.to_string());
        let port = env::var(ENV_REDIS_PORT).unwrap_or_else(|_| DEFAULT_REDIS_PORT.to_string());
        let password = env::var(ENV_REDIS_PASSWORD).ok();
        let db = env::var(ENV_REDIS_DB).unwrap_or_else(|_| DEFAULT_REDIS_DB.to_string());

        // Build Redis URL: redis://[password@]host:port/db
        let redis_url = match password {
            Some(pwd) if !pwd.is_empty() => format!("redis://:{}@{}:{}/{}", pwd, host, port, db),
            _ => format!("redis://{}:{}/{}", host, port, db),
        };

        tracing::debug!(host = %host, port = %port, db = %db, "Connecting to Redis");

        let client = Client::open(redis_url)?;

        // Test the connection by pinging Redis
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        tracing::info!(host = %host, port = %port, "Redis connection established");

        Ok(Self { client })
    }

    pub async fn get_explanation(
        &self,
        key_hash: &str,
    ) -> Result<CanonicalExplanation, CacheError> {
        let full_key = format!("{}{}", PREFIX_EXPLANATION, key_hash);
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let data: Option<String> = conn.get(&full_key).await?;

        match data {
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| CacheError::Serialization(e.to_string()))
            }
            None => Err(CacheError::Miss(key_hash.to_string())),
        }
    }

    pub async fn set_explanation(
        &self,
        key_hash: &str,
        explanation: &CanonicalExplanation,
    ) -> Result<(), CacheError> {
        let full_key = format!("{}{}", PREFIX_EXPLANATION, key_hash);
        let json = serde_json::to_string(explanation)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(&full_key, json, EXPLANATION_TTL_SECONDS).await?;

        tracing::debug!(key = %full_key, "Cached explanation");
        Ok(())
    }
}

/// Cache key for one explanation: alert text, prompts, and model id all
/// participate, so changing any of them regenerates.
pub fn explanation_cache_key(
    rule: &str,
    output: &str,
    provider_name: &str,
    model_id: &str,
    system_prompt: &str,
) -> String {
    let prompt_version = hash_string(system_prompt);
    let key_components = format!(
        "{}|{}|{}|{}|{}",
        rule, output, provider_name, model_id, prompt_version
    );
    hash_string(&key_components)
}

/// Hash a string to a hex string using SHA256
fn hash_string(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_and_input_sensitive() {
        let a = explanation_cache_key("rule", "output", "openai", "gpt-4o-mini", "system");
        let b = explanation_cache_key("rule", "output", "openai", "gpt-4o-mini", "system");
        assert_eq!(a, b);

        let other_model = explanation_cache_key("rule", "output", "openai", "gpt-4o", "system");
        assert_ne!(a, other_model);

        let other_prompt = explanation_cache_key("rule", "output", "openai", "gpt-4o-mini", "v2");
        assert_ne!(a, other_prompt);
    }
}
