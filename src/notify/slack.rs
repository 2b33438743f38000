//! Slack-compatible incoming-webhook channel

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use super::{ChannelError, ChannelMessage, NotificationChannel};
use crate::model::{AlertEvent, CanonicalExplanation, CorrelationContext, SlackConfig};

pub struct SlackChannel {
    client: Client,
    webhook_url: Url,
}

impl SlackChannel {
    /// Returns None when the channel is disabled or has no webhook URL.
    pub fn from_config(config: &SlackConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let webhook_url = match &config.webhook_url {
            Some(url) => url.clone(),
            None => {
                tracing::warn!("Slack channel enabled but notify.slack.webhook_url is not set");
                return None;
            }
        };

        Some(Self {
            client: Client::builder()
                .user_agent("alert-triage-agent/1.0")
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            webhook_url,
        })
    }

    fn header_block(event: &AlertEvent) -> serde_json::Value {
        serde_json::json!({
            "type": "header",
            "text": {
                "type": "plain_text",
                "text": format!(":rotating_light: {} ({})", event.rule, event.priority_raw),
                "emoji": true
            }
        })
    }

    fn section(text: String) -> serde_json::Value {
        serde_json::json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": text}
        })
    }

    fn enriched_payload(
        event: &AlertEvent,
        explanation: &CanonicalExplanation,
        correlation: Option<&CorrelationContext>,
    ) -> serde_json::Value {
        let mut blocks = vec![
            Self::header_block(event),
            Self::section(format!("*Alert:* {}", event.output)),
        ];

        if !explanation.security_impact.is_empty() {
            blocks.push(Self::section(format!(
                "*Security Impact:* {}",
                explanation.security_impact
            )));
        }
        if !explanation.next_steps.is_empty() {
            blocks.push(Self::section(format!(
                "*Next Steps:* {}",
                explanation.next_steps
            )));
        }
        if !explanation.remediation_steps.is_empty() {
            blocks.push(Self::section(format!(
                "*Remediation:* {}",
                explanation.remediation_steps
            )));
        }
        if !explanation.commands.is_empty() {
            blocks.push(Self::section(format!(
                "*Commands:*\n```{}```",
                explanation.commands.join("\n")
            )));
        }

        if let Some(ctx) = correlation {
            blocks.push(Self::section(format!(
                "*Risk:* {:.1}/10 ({} similar, category: {})",
                ctx.risk_score, ctx.similar_count, ctx.threat_category
            )));
            if !ctx.insights.is_empty() {
                blocks.push(Self::section(ctx.insights.join("\n")));
            }
        }

        serde_json::json!({
            "text": format!("{} ({})", event.rule, event.priority_raw),
            "blocks": blocks
        })
    }

    fn degraded_payload(event: &AlertEvent, enrichment_error: &str) -> serde_json::Value {
        serde_json::json!({
            "text": format!("{} ({})", event.rule, event.priority_raw),
            "blocks": [
                Self::header_block(event),
                Self::section(format!("*Alert:* {}", event.output)),
                Self::section(format!(
                    "_Explanation unavailable: {}_",
                    enrichment_error
                )),
            ]
        })
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn id(&self) -> &'static str {
        "slack"
    }

    async fn deliver(&self, message: &ChannelMessage<'_>) -> Result<(), ChannelError> {
        let payload = match message {
            ChannelMessage::Enriched {
                event,
                explanation,
                correlation,
            } => Self::enriched_payload(event, explanation, *correlation),
            ChannelMessage::Degraded {
                event,
                enrichment_error,
            } => Self::degraded_payload(event, enrichment_error),
        };

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected(format!("{}: {}", status, body)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn event() -> AlertEvent {
        AlertEvent {
            rule: "Terminal shell in container".to_string(),
            priority_raw: "warning".to_string(),
            priority: Some(crate::model::AlertPriority::Warning),
            output: "A shell was spawned in a container".to_string(),
            occurred_at: None,
            source: "syscall".to_string(),
            fields: BTreeMap::new(),
        }
    }

    #[test]
    fn disabled_config_builds_no_channel() {
        assert!(SlackChannel::from_config(&SlackConfig::default()).is_none());
    }

    #[test]
    fn enriched_payload_embeds_explanation_sections() {
        let explanation = CanonicalExplanation {
            security_impact: "Interactive access to the container".to_string(),
            next_steps: "Check who opened the shell".to_string(),
            remediation_steps: "Restrict exec access".to_string(),
            commands: vec!["kubectl get pods".to_string()],
            provider_name: "openai".to_string(),
        };
        let payload = SlackChannel::enriched_payload(&event(), &explanation, None);
        let rendered = payload.to_string();
        assert!(rendered.contains("Security Impact"));
        assert!(rendered.contains("kubectl get pods"));
    }

    #[test]
    fn degraded_payload_carries_raw_alert_and_error() {
        let payload = SlackChannel::degraded_payload(&event(), "completion timed out");
        let rendered = payload.to_string();
        assert!(rendered.contains("A shell was spawned in a container"));
        assert!(rendered.contains("completion timed out"));
        assert!(!rendered.contains("Security Impact"));
    }
}
