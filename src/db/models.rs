//! Database models for persisted alerts

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::model::{AlertRecord, AlertStatus, CanonicalExplanation};

/// Database representation of an alert
#[derive(Debug, Clone, FromRow)]
pub struct AlertRow {
    pub id: i64,
    pub occurred_at: DateTime<Utc>,
    pub rule: String,
    pub priority: String,
    pub output: String,
    pub source: String,
    pub fields: serde_json::Value,
    pub explanation: Option<serde_json::Value>,
    pub processed: bool,
    pub status: String,
}

impl AlertRow {
    /// Convert database row to domain model
    pub fn into_domain(self) -> Result<AlertRecord, String> {
        let status = self
            .status
            .parse::<AlertStatus>()
            .unwrap_or(AlertStatus::Unread);

        let fields: BTreeMap<String, serde_json::Value> =
            serde_json::from_value(self.fields).unwrap_or_default();

        let explanation: Option<CanonicalExplanation> = match self.explanation {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| format!("Invalid explanation JSON: {}", e))?,
            ),
            None => None,
        };

        Ok(AlertRecord {
            id: self.id,
            occurred_at: self.occurred_at,
            rule: self.rule,
            priority: self.priority,
            output: self.output,
            source: self.source,
            fields,
            explanation,
            processed: self.processed,
            status,
        })
    }
}

/// Query parameters for listing alerts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAlertsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub rule: Option<String>,
}

/// Paginated response for alerts
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedAlerts {
    pub alerts: Vec<AlertRecord>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: i64,
    pub total_pages: u32,
}

/// Alert counts grouped by status
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct StatusCounts {
    pub unread: i64,
    pub read: i64,
    pub dismissed: i64,
    pub total: i64,
}

/// Aggregate statistics over a time range
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AlertStatistics {
    pub total: i64,
    pub by_priority: Vec<CountBucket>,
    pub by_rule: Vec<CountBucket>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// One (key, count) aggregation bucket
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CountBucket {
    pub key: String,
    pub count: i64,
}
