//! Correlation output types: risk context, threat taxonomy, attack chain

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Fixed threat taxonomy. Declaration order breaks classification ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    Malware,
    Intrusion,
    DataExfiltration,
    Reconnaissance,
    LateralMovement,
    Persistence,
    Evasion,
    Misconfiguration,
    Unknown,
}

impl ThreatCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreatCategory::Malware => "malware",
            ThreatCategory::Intrusion => "intrusion",
            ThreatCategory::DataExfiltration => "data_exfiltration",
            ThreatCategory::Reconnaissance => "reconnaissance",
            ThreatCategory::LateralMovement => "lateral_movement",
            ThreatCategory::Persistence => "persistence",
            ThreatCategory::Evasion => "evasion",
            ThreatCategory::Misconfiguration => "misconfiguration",
            ThreatCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One phase of a predicted attack chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttackPhase {
    pub phase: String,
    pub likelihood: f64,
}

/// A historical alert returned by the similarity provider, trimmed to what
/// scoring and rendering need.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NeighborSummary {
    pub rule: String,
    pub priority: String,
    pub output: String,
    pub source: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub certainty: f64,
}

/// Result of correlating one alert against the historical corpus.
///
/// Recomputed fresh on every request; embedded in delivery/response output,
/// never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CorrelationContext {
    pub similar_count: usize,
    pub neighbors: Vec<NeighborSummary>,
    pub priority_histogram: BTreeMap<String, usize>,
    pub source_histogram: BTreeMap<String, usize>,
    pub insights: Vec<String>,
    pub risk_score: f64,
    pub confidence: f64,
    pub threat_category: ThreatCategory,
    pub attack_chain: Vec<AttackPhase>,
}
