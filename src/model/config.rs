use serde::Deserialize;
use std::fs;
use std::path::Path;
use url::Url;

use super::alert::AlertPriority;

const ENV_CONFIG_PATH: &str = "TRIAGE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Admission filter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Minimum priority an alert must reach to be processed.
    #[serde(default = "default_min_priority")]
    pub min_priority: AlertPriority,
    /// Maximum alert age in minutes. Zero or negative disables the check.
    #[serde(default = "default_max_age_minutes")]
    pub max_age_minutes: i64,
}

fn default_min_priority() -> AlertPriority {
    AlertPriority::Warning
}

fn default_max_age_minutes() -> i64 {
    60
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_priority: default_min_priority(),
            max_age_minutes: default_max_age_minutes(),
        }
    }
}

/// Deduplication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How long a key suppresses repeats, in minutes.
    #[serde(default = "default_dedup_window")]
    pub window_minutes: i64,
    /// How often the background sweep evicts expired entries, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_dedup_window() -> i64 {
    15
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_minutes: default_dedup_window(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Which completion provider backs explanation generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Local,
}

/// Text-completion provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub kind: ProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL for OpenAI-compatible local endpoints (ignored otherwise).
    #[serde(default)]
    pub base_url: Option<Url>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_kind() -> ProviderKind {
    ProviderKind::OpenAi
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u64 {
    500
}

fn default_temperature() -> f64 {
    0.3
}

fn default_provider_timeout() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            model: default_model(),
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

/// Similarity-provider (historical correlation) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorrelationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Similarity engine endpoint.
    #[serde(default = "default_similarity_url")]
    pub url: Url,
    /// Object class holding historical alerts.
    #[serde(default = "default_class_name")]
    pub class_name: String,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_certainty")]
    pub certainty_threshold: f64,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_similarity_url() -> Url {
    Url::parse("http://127.0.0.1:8080").expect("static URL")
}

fn default_class_name() -> String {
    "SecurityAlert".to_string()
}

fn default_top_k() -> u32 {
    5
}

fn default_certainty() -> f64 {
    0.6
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_similarity_url(),
            class_name: default_class_name(),
            top_k: default_top_k(),
            certainty_threshold: default_certainty(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

/// Slack-compatible incoming-webhook channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: Option<Url>,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_notify_timeout() -> u64 {
    10
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            timeout_secs: default_notify_timeout(),
        }
    }
}

/// Notification fan-out configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub slack: SlackConfig,
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub filters: FilterConfig,
    pub dedup: DedupConfig,
    pub provider: ProviderConfig,
    pub correlation: CorrelationConfig,
    pub notify: NotifyConfig,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filters: FilterConfig::default(),
            dedup: DedupConfig::default(),
            provider: ProviderConfig::default(),
            correlation: CorrelationConfig::default(),
            notify: NotifyConfig::default(),
            port: 8088,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8088);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file = Self::load_config_file(&config_path).unwrap_or_default();

        Self {
            filters: file.filters,
            dedup: file.dedup,
            provider: file.provider,
            correlation: file.correlation,
            notify: file.notify,
            port,
            host,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                let contents = contents.trim();
                if contents.is_empty() {
                    tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
                    return Some(ConfigFile::default());
                }

                match serde_yaml::from_str(contents) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Loaded configuration from file");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let file: ConfigFile = serde_yaml::from_str("{}").unwrap();
        assert_eq!(file.filters.min_priority, AlertPriority::Warning);
        assert!(file.dedup.enabled);
        assert_eq!(file.correlation.top_k, 5);
        assert!(!file.notify.slack.enabled);
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let yaml = r#"
filters:
  min_priority: critical
  max_age_minutes: 0
dedup:
  window_minutes: 5
"#;
        let file: ConfigFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(file.filters.min_priority, AlertPriority::Critical);
        assert_eq!(file.filters.max_age_minutes, 0);
        assert_eq!(file.dedup.window_minutes, 5);
        assert_eq!(file.provider.max_tokens, 500);
    }
}
