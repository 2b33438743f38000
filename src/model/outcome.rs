//! Terminal pipeline outcomes and per-channel delivery results

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::correlation::CorrelationContext;

/// Why an alert was skipped at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    PriorityTooLow,
    TooOld,
}

impl IgnoreReason {
    pub fn as_str(self) -> &'static str {
        match self {
            IgnoreReason::PriorityTooLow => "priority_too_low",
            IgnoreReason::TooOld => "too_old",
        }
    }
}

/// Result of one delivery attempt to one channel.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryOutcome {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Aggregate delivery status for one persisted alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Success,
    PartialSuccess,
    NoChannel,
    ChannelError,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::PartialSuccess => "partial_success",
            DeliveryStatus::NoChannel => "no_channel",
            DeliveryStatus::ChannelError => "channel_error",
        }
    }
}

/// Every pipeline pass terminates in exactly one of these.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Ignored {
        reason: IgnoreReason,
    },
    Duplicate {
        count: u32,
    },
    Processed {
        alert_id: i64,
        delivery: DeliveryStatus,
        outcomes: Vec<DeliveryOutcome>,
        enriched: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        correlation: Option<CorrelationContext>,
    },
}
