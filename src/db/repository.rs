//! Repository for alert database operations

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::models::{
    AlertRow, AlertStatistics, CountBucket, ListAlertsQuery, PaginatedAlerts, StatusCounts,
};
use super::DbError;
use crate::model::{AlertEvent, AlertRecord, AlertStatus, CanonicalExplanation};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_RULE_BUCKETS: i64 = 25;

/// Repository for alert operations
#[derive(Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new alert and return its assigned id
    pub async fn insert(
        &self,
        event: &AlertEvent,
        explanation: Option<&CanonicalExplanation>,
        processed: bool,
    ) -> Result<i64, DbError> {
        let fields_json = serde_json::to_value(&event.fields)
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        let explanation_json = explanation
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        let occurred_at = event.occurred_at_or(Utc::now());

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO alerts (
                occurred_at, rule, priority, output, source, fields,
                explanation, processed, status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'unread')
            RETURNING id
            "#,
        )
        .bind(occurred_at)
        .bind(&event.rule)
        .bind(&event.priority_raw)
        .bind(&event.output)
        .bind(&event.source)
        .bind(&fields_json)
        .bind(&explanation_json)
        .bind(processed)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(id = id, rule = %event.rule, "Inserted alert");
        Ok(id)
    }

    /// Get an alert by id
    pub async fn get_by_id(&self, id: i64) -> Result<AlertRecord, DbError> {
        let row: AlertRow = sqlx::query_as(
            r#"
            SELECT * FROM alerts WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(id.to_string()))?;

        row.into_domain().map_err(DbError::Serialization)
    }

    /// Update the status of a single alert
    /// Returns true if a row was updated, false if the id does not exist
    pub async fn update_status(&self, id: i64, status: AlertStatus) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE alerts SET status = $1 WHERE id = $2
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Update the status of many alerts at once
    /// Returns the number of rows updated
    pub async fn bulk_update_status(
        &self,
        ids: &[i64],
        status: AlertStatus,
    ) -> Result<u64, DbError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE alerts SET status = $1 WHERE id = ANY($2)
            "#,
        )
        .bind(status.as_str())
        .bind(ids)
        .execute(&self.pool)
        .await?;

        tracing::debug!(count = result.rows_affected(), status = %status, "Bulk status update");
        Ok(result.rows_affected())
    }

    /// Overwrite the explanation of an existing alert and mark it processed.
    /// The row-level single-statement update keeps concurrent reprocessing
    /// from interleaving partial writes.
    pub async fn update_explanation(
        &self,
        id: i64,
        explanation: Option<&CanonicalExplanation>,
    ) -> Result<(), DbError> {
        let explanation_json = explanation
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DbError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE alerts SET explanation = $1, processed = TRUE WHERE id = $2
            "#,
        )
        .bind(&explanation_json)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(id.to_string()));
        }

        tracing::debug!(id = id, "Updated alert explanation");
        Ok(())
    }

    /// List alerts with pagination and status/priority/rule filters
    pub async fn list(&self, query: ListAlertsQuery) -> Result<PaginatedAlerts, DbError> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).min(100);
        let offset = (page - 1) * page_size;

        // Build dynamic query
        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref status) = query.status {
            params.push(status.clone());
            conditions.push(format!("status = ${}", params.len()));
        }

        if let Some(ref priority) = query.priority {
            params.push(priority.clone());
            conditions.push(format!("priority = ${}", params.len()));
        }

        if let Some(ref rule) = query.rule {
            params.push(rule.clone());
            conditions.push(format!("rule = ${}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Get total count
        let count_query = format!("SELECT COUNT(*) as count FROM alerts {}", where_clause);

        let total_count: i64 = {
            let mut q = sqlx::query_scalar(&count_query);
            for param in &params {
                q = q.bind(param);
            }
            q.fetch_one(&self.pool).await?
        };

        // Get alerts
        let select_query = format!(
            r#"
            SELECT * FROM alerts
            {}
            ORDER BY occurred_at DESC
            LIMIT {} OFFSET {}
            "#,
            where_clause, page_size, offset
        );

        let rows: Vec<AlertRow> = {
            let mut q = sqlx::query_as(&select_query);
            for param in &params {
                q = q.bind(param);
            }
            q.fetch_all(&self.pool).await?
        };

        let alerts: Vec<AlertRecord> = rows
            .into_iter()
            .filter_map(|row| row.into_domain().ok())
            .collect();

        let total_pages = ((total_count as f64) / (page_size as f64)).ceil() as u32;

        Ok(PaginatedAlerts {
            alerts,
            page,
            page_size,
            total_count,
            total_pages,
        })
    }

    /// Count alerts grouped by status
    pub async fn count_by_status(&self) -> Result<StatusCounts, DbError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) FROM alerts GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            counts.total += count;
            match status.as_str() {
                "unread" => counts.unread = count,
                "read" => counts.read = count,
                "dismissed" => counts.dismissed = count,
                other => {
                    tracing::warn!(status = %other, "Unexpected status value in alerts table");
                }
            }
        }

        Ok(counts)
    }

    /// Aggregate counts by priority and rule over an optional time range
    pub async fn statistics(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<AlertStatistics, DbError> {
        let mut conditions = Vec::new();
        if since.is_some() {
            conditions.push(format!("occurred_at >= ${}", conditions.len() + 1));
        }
        if until.is_some() {
            conditions.push(format!("occurred_at <= ${}", conditions.len() + 1));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let priority_query = format!(
            "SELECT priority, COUNT(*) FROM alerts {} GROUP BY priority ORDER BY COUNT(*) DESC",
            where_clause
        );
        let mut q = sqlx::query_as::<_, (String, i64)>(&priority_query);
        if let Some(since) = since {
            q = q.bind(since);
        }
        if let Some(until) = until {
            q = q.bind(until);
        }
        let priority_rows = q.fetch_all(&self.pool).await?;

        let rule_query = format!(
            "SELECT rule, COUNT(*) FROM alerts {} GROUP BY rule ORDER BY COUNT(*) DESC LIMIT {}",
            where_clause, MAX_RULE_BUCKETS
        );
        let mut q = sqlx::query_as::<_, (String, i64)>(&rule_query);
        if let Some(since) = since {
            q = q.bind(since);
        }
        if let Some(until) = until {
            q = q.bind(until);
        }
        let rule_rows = q.fetch_all(&self.pool).await?;

        let total = priority_rows.iter().map(|(_, c)| c).sum();

        Ok(AlertStatistics {
            total,
            by_priority: priority_rows
                .into_iter()
                .map(|(key, count)| CountBucket { key, count })
                .collect(),
            by_rule: rule_rows
                .into_iter()
                .map(|(key, count)| CountBucket { key, count })
                .collect(),
            since,
            until,
        })
    }
}
