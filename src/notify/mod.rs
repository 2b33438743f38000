//! Outbound notification channels

mod slack;

use async_trait::async_trait;

use crate::model::{AlertEvent, CanonicalExplanation, CorrelationContext};

pub use slack::SlackChannel;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Channel rejected the message: {0}")]
    Rejected(String),
}

/// What a channel renders for one alert: the enrichment either succeeded
/// and carries an explanation, or failed with a recorded reason.
#[derive(Debug, Clone)]
pub enum ChannelMessage<'a> {
    Enriched {
        event: &'a AlertEvent,
        explanation: &'a CanonicalExplanation,
        correlation: Option<&'a CorrelationContext>,
    },
    Degraded {
        event: &'a AlertEvent,
        enrichment_error: &'a str,
    },
}

/// One outbound notification destination.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Stable channel id recorded in delivery outcomes
    fn id(&self) -> &'static str;

    async fn deliver(&self, message: &ChannelMessage<'_>) -> Result<(), ChannelError>;
}
