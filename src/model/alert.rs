//! Core alert domain types

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The eight Falco-style priority levels, ordered from least to most severe.
///
/// Comparisons always go through the rank, never the string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Debug,
    Informational,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl AlertPriority {
    pub const ALL: [AlertPriority; 8] = [
        AlertPriority::Debug,
        AlertPriority::Informational,
        AlertPriority::Notice,
        AlertPriority::Warning,
        AlertPriority::Error,
        AlertPriority::Critical,
        AlertPriority::Alert,
        AlertPriority::Emergency,
    ];

    /// Position in the total order, 0 = debug .. 7 = emergency.
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Numeric weight on the 2..16 scale used by risk scoring.
    pub fn weight(self) -> f64 {
        2.0 + 2.0 * f64::from(self.rank())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertPriority::Debug => "debug",
            AlertPriority::Informational => "informational",
            AlertPriority::Notice => "notice",
            AlertPriority::Warning => "warning",
            AlertPriority::Error => "error",
            AlertPriority::Critical => "critical",
            AlertPriority::Alert => "alert",
            AlertPriority::Emergency => "emergency",
        }
    }
}

impl FromStr for AlertPriority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debug" => Ok(AlertPriority::Debug),
            "informational" | "info" => Ok(AlertPriority::Informational),
            "notice" => Ok(AlertPriority::Notice),
            "warning" | "warn" => Ok(AlertPriority::Warning),
            "error" => Ok(AlertPriority::Error),
            "critical" => Ok(AlertPriority::Critical),
            "alert" => Ok(AlertPriority::Alert),
            "emergency" => Ok(AlertPriority::Emergency),
            other => Err(UnknownPriority(other.to_string())),
        }
    }
}

impl fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown priority: {0}")]
pub struct UnknownPriority(pub String);

/// Lifecycle status of a persisted alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Unread,
    Read,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Unread => "unread",
            AlertStatus::Read => "read",
            AlertStatus::Dismissed => "dismissed",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unread" => Ok(AlertStatus::Unread),
            "read" => Ok(AlertStatus::Read),
            "dismissed" => Ok(AlertStatus::Dismissed),
            other => Err(format!("unknown alert status: {}", other)),
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound security event, alive for a single pipeline pass.
///
/// The raw priority string is kept alongside the parsed level so that
/// unrecognized priorities can flow through fail-open and still be stored.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub rule: String,
    pub priority_raw: String,
    pub priority: Option<AlertPriority>,
    pub output: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub source: String,
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl AlertEvent {
    /// Timestamp to persist: the event's own when parseable, else now.
    pub fn occurred_at_or(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        self.occurred_at.unwrap_or(fallback)
    }
}

/// Structured explanation parsed from raw provider output.
///
/// Section fields may be empty but are never absent; `commands` preserves
/// the order the lines appeared in the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CanonicalExplanation {
    pub security_impact: String,
    pub next_steps: String,
    pub remediation_steps: String,
    pub commands: Vec<String>,
    pub provider_name: String,
}

/// A persisted alert. `id` is assigned by the store at insert and is stable
/// for the record's lifetime.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AlertRecord {
    pub id: i64,
    pub occurred_at: DateTime<Utc>,
    pub rule: String,
    pub priority: String,
    pub output: String,
    pub source: String,
    #[schema(value_type = Object)]
    pub fields: BTreeMap<String, serde_json::Value>,
    pub explanation: Option<CanonicalExplanation>,
    pub processed: bool,
    pub status: AlertStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_is_total_and_rank_based() {
        let mut prev: Option<AlertPriority> = None;
        for p in AlertPriority::ALL {
            if let Some(prev) = prev {
                assert!(prev < p);
                assert!(prev.rank() < p.rank());
            }
            prev = Some(p);
        }
        // "critical" < "debug" lexically; rank order must disagree
        assert!(AlertPriority::Critical > AlertPriority::Debug);
    }

    #[test]
    fn priority_weights_span_2_to_16() {
        assert_eq!(AlertPriority::Debug.weight(), 2.0);
        assert_eq!(AlertPriority::Warning.weight(), 8.0);
        assert_eq!(AlertPriority::Emergency.weight(), 16.0);
    }

    #[test]
    fn priority_parses_common_aliases() {
        assert_eq!("WARNING".parse::<AlertPriority>().unwrap(), AlertPriority::Warning);
        assert_eq!("info".parse::<AlertPriority>().unwrap(), AlertPriority::Informational);
        assert!("bogus".parse::<AlertPriority>().is_err());
    }
}
